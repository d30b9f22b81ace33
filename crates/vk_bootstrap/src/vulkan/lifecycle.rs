//! Lifecycle sequencing for context establishment and teardown
//!
//! Stages advance strictly in order. Every resource a stage creates is recorded in a ledger at
//! the moment it comes into existence, and teardown walks that ledger backwards, so destruction
//! is always the exact reverse of creation, including after a failure halfway through a stage.
//!
//! ```text
//! Uninitialized -> InstanceReady -> SurfaceReady -> DeviceReady -> SwapchainReady -> Running
//!        |               |                |               |               |           |
//!        +---------------+----------------+---------------+---------------+-----------+
//!                                               |
//!                                               v
//!                                  TearingDown -> Terminated
//! ```

use crate::vulkan::error::{BootstrapFailure, VulkanError, VulkanResult};

/// Lifecycle stage of a context
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    /// Nothing created yet
    Uninitialized,
    /// Instance (and diagnostics, if requested) exist
    InstanceReady,
    /// Presentation surface exists
    SurfaceReady,
    /// Logical device and queues exist
    DeviceReady,
    /// Swapchain and image views exist
    SwapchainReady,
    /// Fully established
    Running,
    /// Resources are being released
    TearingDown,
    /// Everything released
    Terminated,
}

impl Stage {
    /// Stages entered by a bootstrap, in order
    pub const BOOTSTRAP_SEQUENCE: [Self; 4] = [
        Self::InstanceReady,
        Self::SurfaceReady,
        Self::DeviceReady,
        Self::SwapchainReady,
    ];

    /// The stage that follows this one
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Uninitialized => Some(Self::InstanceReady),
            Self::InstanceReady => Some(Self::SurfaceReady),
            Self::SurfaceReady => Some(Self::DeviceReady),
            Self::DeviceReady => Some(Self::SwapchainReady),
            Self::SwapchainReady => Some(Self::Running),
            Self::Running => Some(Self::TearingDown),
            Self::TearingDown => Some(Self::Terminated),
            Self::Terminated => None,
        }
    }
}

/// Kinds of resource tracked by the teardown ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Native window and the windowing library
    Window,
    /// Vulkan instance
    Instance,
    /// Debug messenger registration
    Diagnostics,
    /// Presentation surface
    Surface,
    /// Logical device and its queues
    Device,
    /// Swapchain
    Swapchain,
    /// Per-image views of the swapchain
    ImageViews,
    /// Framebuffers, pipelines and command objects built on the swapchain
    SwapchainDependents,
}

impl ResourceKind {
    /// Whether the resource is rebuilt by swapchain recreation
    pub fn is_swapchain_scoped(self) -> bool {
        matches!(self, Self::Swapchain | Self::ImageViews | Self::SwapchainDependents)
    }
}

/// Creation-ordered record of live resources
#[derive(Debug, Default, Clone)]
pub struct TeardownLedger {
    live: Vec<ResourceKind>,
}

impl TeardownLedger {
    /// Record that `kind` now exists
    pub fn record(&mut self, kind: ResourceKind) {
        debug_assert!(!self.live.contains(&kind), "{kind:?} recorded twice");
        self.live.push(kind);
    }

    /// Record `kind` unless it is already live
    pub fn record_once(&mut self, kind: ResourceKind) {
        if !self.live.contains(&kind) {
            self.live.push(kind);
        }
    }

    /// Whether `kind` is currently live
    pub fn contains(&self, kind: ResourceKind) -> bool {
        self.live.contains(&kind)
    }

    /// Live resources in creation order
    pub fn live(&self) -> &[ResourceKind] {
        &self.live
    }

    /// Remove and return the most recently created resource
    pub fn pop(&mut self) -> Option<ResourceKind> {
        self.live.pop()
    }

    /// Remove and return the trailing swapchain-scoped resources, newest first
    pub fn pop_swapchain_scoped(&mut self) -> Vec<ResourceKind> {
        let mut popped = Vec::new();
        while let Some(&kind) = self.live.last() {
            if !kind.is_swapchain_scoped() {
                break;
            }
            popped.push(kind);
            self.live.pop();
        }
        popped
    }

    /// Whether nothing is live
    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }
}

/// Creates and releases the resources of each stage
///
/// Implementations must record every resource in the ledger immediately after creating it, so a
/// failure later in the same stage still tears it down.
pub trait StageDriver {
    /// Resources that already exist when the sequencer takes ownership, in creation order
    fn adopted(&self) -> Vec<ResourceKind> {
        Vec::new()
    }

    /// Create everything `stage` needs
    fn enter(&mut self, stage: Stage, ledger: &mut TeardownLedger) -> VulkanResult<()>;

    /// Destroy one resource
    fn release(&mut self, resource: ResourceKind);

    /// Called before swapchain-scoped resources are released for recreation
    fn prepare_recreate(&mut self) -> VulkanResult<()> {
        Ok(())
    }

    /// Driver messages worth attaching to a failure report
    fn drain_driver_messages(&mut self) -> Vec<String> {
        Vec::new()
    }
}

/// Drives a [`StageDriver`] through the lifecycle
///
/// Not reentrant: every method takes `&mut self`, so concurrent use is ruled out by the borrow
/// checker. Dropping a sequencer that has not terminated tears it down.
pub struct LifecycleSequencer<D: StageDriver> {
    driver: D,
    stage: Stage,
    ledger: TeardownLedger,
}

impl<D: StageDriver> LifecycleSequencer<D> {
    /// Take ownership of `driver` and any resources it already holds
    pub fn new(driver: D) -> Self {
        let mut ledger = TeardownLedger::default();
        for kind in driver.adopted() {
            ledger.record(kind);
        }
        Self {
            driver,
            stage: Stage::Uninitialized,
            ledger,
        }
    }

    /// Current stage
    pub fn stage(&self) -> Stage {
        self.stage
    }

    /// Live resources in creation order
    pub fn live_resources(&self) -> &[ResourceKind] {
        self.ledger.live()
    }

    /// Get the driver
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Get the driver mutably
    pub fn driver_mut(&mut self) -> &mut D {
        &mut self.driver
    }

    /// Record a resource created outside the stage sequence
    ///
    /// Only a running context accepts new resources; anything recorded later would never be
    /// released.
    pub fn record(&mut self, kind: ResourceKind) -> VulkanResult<()> {
        if self.stage != Stage::Running {
            return Err(VulkanError::InvalidStage {
                expected: Stage::Running,
                actual: self.stage,
            });
        }
        self.ledger.record_once(kind);
        Ok(())
    }

    /// Run every bootstrap stage up to `Running`
    ///
    /// On the first failure the sequencer tears down what was built and reports the error
    /// along with any driver messages captured before teardown.
    pub fn bootstrap(&mut self) -> Result<(), BootstrapFailure> {
        if self.stage != Stage::Uninitialized {
            return Err(BootstrapFailure::new(VulkanError::InvalidStage {
                expected: Stage::Uninitialized,
                actual: self.stage,
            }));
        }

        for stage in Stage::BOOTSTRAP_SEQUENCE {
            self.advance(stage)?;
        }
        self.stage = Stage::Running;
        log::info!("Context running");
        Ok(())
    }

    /// Rebuild only the swapchain-scoped resources
    ///
    /// Any failure tears the whole context down.
    pub fn recreate_swapchain(&mut self) -> Result<(), BootstrapFailure> {
        if self.stage != Stage::Running {
            return Err(BootstrapFailure::new(VulkanError::InvalidStage {
                expected: Stage::Running,
                actual: self.stage,
            }));
        }

        if let Err(error) = self.driver.prepare_recreate() {
            return Err(self.fail(error));
        }

        for kind in self.ledger.pop_swapchain_scoped() {
            log::debug!("Releasing {:?} for swapchain recreation", kind);
            self.driver.release(kind);
        }
        self.stage = Stage::DeviceReady;

        self.advance(Stage::SwapchainReady)?;
        self.stage = Stage::Running;
        log::info!("Swapchain recreated");
        Ok(())
    }

    /// Release every live resource in reverse creation order
    ///
    /// Safe to call more than once.
    pub fn teardown(&mut self) {
        if self.stage == Stage::Terminated {
            return;
        }
        log::info!("Tearing down context from {:?}", self.stage);
        self.stage = Stage::TearingDown;
        while let Some(kind) = self.ledger.pop() {
            log::debug!("Releasing {:?}", kind);
            self.driver.release(kind);
        }
        self.stage = Stage::Terminated;
        log::info!("Context terminated");
    }

    fn advance(&mut self, stage: Stage) -> Result<(), BootstrapFailure> {
        log::debug!("Entering {:?}", stage);
        match self.driver.enter(stage, &mut self.ledger) {
            Ok(()) => {
                self.stage = stage;
                Ok(())
            }
            Err(error) => {
                log::error!("Failed to reach {:?}: {}", stage, error);
                Err(self.fail(error))
            }
        }
    }

    fn fail(&mut self, error: VulkanError) -> BootstrapFailure {
        let driver_messages = self.driver.drain_driver_messages();
        self.teardown();
        BootstrapFailure {
            error,
            driver_messages,
        }
    }
}

impl<D: StageDriver> Drop for LifecycleSequencer<D> {
    fn drop(&mut self) {
        self.teardown();
    }
}
