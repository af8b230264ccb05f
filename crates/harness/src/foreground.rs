use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use resync_core::InstanceId;
use resync_engine::{EngineError, ForegroundInstance, ForegroundRegistry, HostLifecycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Acknowledge,
    /// Never answers a navigation request.
    Hang,
    Fail,
}

pub struct TestInstance {
    id: InstanceId,
    behavior: Behavior,
    navigations: Mutex<Vec<String>>,
    focus_count: AtomicUsize,
}

impl TestInstance {
    pub fn new(behavior: Behavior) -> Arc<Self> {
        Arc::new(Self {
            id: InstanceId::new(),
            behavior,
            navigations: Mutex::new(Vec::new()),
            focus_count: AtomicUsize::new(0),
        })
    }

    pub fn acknowledging() -> Arc<Self> {
        Self::new(Behavior::Acknowledge)
    }

    pub fn unresponsive() -> Arc<Self> {
        Self::new(Behavior::Hang)
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    pub fn focus_count(&self) -> usize {
        self.focus_count.load(Ordering::Acquire)
    }
}

#[async_trait]
impl ForegroundInstance for TestInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    async fn navigate(&self, url: &str) -> Result<(), EngineError> {
        self.navigations.lock().push(url.to_string());
        match self.behavior {
            Behavior::Acknowledge => Ok(()),
            Behavior::Hang => std::future::pending().await,
            Behavior::Fail => Err(EngineError::Host("instance crashed".into())),
        }
    }

    async fn focus(&self) -> Result<(), EngineError> {
        self.focus_count.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}

/// Host double: lifecycle hooks plus the set of open foreground instances.
#[derive(Default)]
pub struct TestHost {
    instances: Mutex<Vec<Arc<TestInstance>>>,
    opened: Mutex<Vec<String>>,
    activations: AtomicUsize,
    deregistrations: AtomicUsize,
    deregister_fails: AtomicBool,
}

impl TestHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_instances(instances: Vec<Arc<TestInstance>>) -> Arc<Self> {
        let host = Self::default();
        *host.instances.lock() = instances;
        Arc::new(host)
    }

    pub fn fail_deregister(&self) {
        self.deregister_fails.store(true, Ordering::Release);
    }

    pub fn activations(&self) -> usize {
        self.activations.load(Ordering::Acquire)
    }

    pub fn deregistrations(&self) -> usize {
        self.deregistrations.load(Ordering::Acquire)
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl HostLifecycle for TestHost {
    async fn activate_now(&self) -> Result<(), EngineError> {
        self.activations.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    async fn deregister(&self) -> Result<bool, EngineError> {
        self.deregistrations.fetch_add(1, Ordering::AcqRel);
        if self.deregister_fails.load(Ordering::Acquire) {
            return Err(EngineError::Host("registration not found".into()));
        }
        Ok(true)
    }
}

#[async_trait]
impl ForegroundRegistry for TestHost {
    async fn instances(&self) -> Vec<Arc<dyn ForegroundInstance>> {
        self.instances
            .lock()
            .iter()
            .map(|i| i.clone() as Arc<dyn ForegroundInstance>)
            .collect()
    }

    async fn open_instance(&self, url: &str) -> Result<Arc<dyn ForegroundInstance>, EngineError> {
        self.opened.lock().push(url.to_string());
        let instance = TestInstance::acknowledging();
        self.instances.lock().push(instance.clone());
        Ok(instance)
    }
}
