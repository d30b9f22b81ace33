//! Vulkan context management
//!
//! [`Context`] is what applications hold: a lifecycle sequencer driving [`VulkanStages`], which
//! owns every object the bootstrap creates. The sequencer decides when things are created and
//! in which order they are destroyed; the stages only know how.

use ash::vk;

use crate::core::config::ContextConfig;
use crate::vulkan::device::{DeviceRequest, LogicalDevice};
use crate::vulkan::diagnostics::DiagnosticsBridge;
use crate::vulkan::error::{BootstrapFailure, VulkanError, VulkanResult};
use crate::vulkan::instance::{ApplicationIdentity, InstanceContext};
use crate::vulkan::lifecycle::{
    LifecycleSequencer, ResourceKind, Stage, StageDriver, TeardownLedger,
};
use crate::vulkan::physical_device::{
    select_physical_device, PhysicalDeviceSelector, SelectedDevice, SurfaceSupport,
};
use crate::vulkan::swapchain::{ImageViews, Swapchain, SwapchainDescriptor};
use crate::window::{GlfwWindow, PresentationSurface};

/// Objects built on the swapchain by collaborators (framebuffers, pipelines, command pools)
///
/// They are destroyed before the image views, on teardown and on swapchain recreation, and
/// must be attached again after a recreation.
pub trait SwapchainDependent {
    /// Release every device object held
    fn destroy(&mut self, device: &ash::Device);
}

/// Owner of every resource the bootstrap creates
pub struct VulkanStages<W: PresentationSurface> {
    config: ContextConfig,
    window: Option<W>,
    instance: Option<InstanceContext>,
    diagnostics: DiagnosticsBridge,
    surface: Option<vk::SurfaceKHR>,
    selected: Option<SelectedDevice>,
    device: Option<LogicalDevice>,
    swapchain: Option<Swapchain>,
    image_views: Option<ImageViews>,
    dependents: Vec<Box<dyn SwapchainDependent>>,
}

impl<W: PresentationSurface> VulkanStages<W> {
    /// Stages for `window`, nothing created yet
    pub fn new(window: W, config: ContextConfig) -> Self {
        Self {
            config,
            window: Some(window),
            instance: None,
            diagnostics: DiagnosticsBridge::inert(),
            surface: None,
            selected: None,
            device: None,
            swapchain: None,
            image_views: None,
            dependents: Vec::new(),
        }
    }

    fn window_mut(&mut self) -> VulkanResult<&mut W> {
        self.window.as_mut().ok_or_else(|| {
            VulkanError::SurfaceCreationFailed("window already destroyed".to_string())
        })
    }

    fn instance(&self, stage: Stage) -> VulkanResult<&InstanceContext> {
        self.instance.as_ref().ok_or(VulkanError::InvalidStage {
            expected: Stage::InstanceReady,
            actual: stage,
        })
    }

    fn surface(&self, stage: Stage) -> VulkanResult<vk::SurfaceKHR> {
        self.surface.ok_or(VulkanError::InvalidStage {
            expected: Stage::SurfaceReady,
            actual: stage,
        })
    }

    fn device(&self, stage: Stage) -> VulkanResult<&LogicalDevice> {
        self.device.as_ref().ok_or(VulkanError::InvalidStage {
            expected: Stage::DeviceReady,
            actual: stage,
        })
    }

    fn create_instance(&mut self, ledger: &mut TeardownLedger) -> VulkanResult<()> {
        let enable_diagnostics = self.config.enable_diagnostics;
        let surface_extensions = self
            .window_mut()?
            .required_instance_extensions()
            .map_err(|e| VulkanError::SurfaceCreationFailed(e.to_string()))?;

        let identity = ApplicationIdentity {
            application_name: self.config.application_name.clone(),
            engine_name: self.config.engine_name.clone(),
        };
        let instance = InstanceContext::new(
            &identity,
            &surface_extensions,
            enable_diagnostics,
            self.config.requested_layers(),
        )?;
        let instance = self.instance.insert(instance);
        ledger.record(ResourceKind::Instance);

        let bridge =
            DiagnosticsBridge::install(instance.entry(), instance.instance(), enable_diagnostics)?;
        if bridge.is_active() {
            self.diagnostics = bridge;
            ledger.record(ResourceKind::Diagnostics);
        }
        Ok(())
    }

    fn create_surface(&mut self, ledger: &mut TeardownLedger) -> VulkanResult<()> {
        let handle = self.instance(Stage::SurfaceReady)?.handle();
        let surface = self
            .window_mut()?
            .create_surface(handle)
            .map_err(|e| VulkanError::SurfaceCreationFailed(e.to_string()))?;
        self.surface = Some(surface);
        ledger.record(ResourceKind::Surface);
        log::info!("Presentation surface created");
        Ok(())
    }

    fn create_device(&mut self, ledger: &mut TeardownLedger) -> VulkanResult<()> {
        let instance = self.instance(Stage::DeviceReady)?;
        let surface = self.surface(Stage::DeviceReady)?;

        let selector =
            PhysicalDeviceSelector::new(self.config.device_extensions.iter().cloned(), true);
        let selected = select_physical_device(
            instance.instance(),
            Some((instance.surface_loader(), surface)),
            &selector,
        )?;

        let request = DeviceRequest {
            extensions: selector.required_extensions().to_vec(),
            layers: instance.enabled().layers.clone(),
            features: vk::PhysicalDeviceFeatures::default(),
        };
        let device = LogicalDevice::new(instance.instance(), &selected, &request)?;

        self.selected = Some(selected);
        self.device = Some(device);
        ledger.record(ResourceKind::Device);
        Ok(())
    }

    fn create_swapchain(&mut self, ledger: &mut TeardownLedger) -> VulkanResult<()> {
        let configured = (self.config.window.width, self.config.window.height);
        let (width, height) = self
            .window
            .as_ref()
            .map_or(configured, |window| window.framebuffer_size());
        let requested = vk::Extent2D { width, height };

        let missing = |expected| VulkanError::InvalidStage {
            expected,
            actual: Stage::SwapchainReady,
        };
        let instance = self.instance.as_ref().ok_or_else(|| missing(Stage::InstanceReady))?;
        let surface = self.surface.ok_or_else(|| missing(Stage::SurfaceReady))?;
        let device = self.device.as_ref().ok_or_else(|| missing(Stage::DeviceReady))?;

        // Capabilities change with the window, so they are queried fresh every time
        let support =
            SurfaceSupport::query(instance.surface_loader(), device.physical_device(), surface)?;
        let descriptor =
            SwapchainDescriptor::derive(&support, &device.queue_families(), requested)?;

        let swapchain = self
            .swapchain
            .insert(Swapchain::new(device.swapchain_loader(), surface, descriptor)?);
        ledger.record(ResourceKind::Swapchain);

        self.image_views = Some(ImageViews::new(device.raw(), swapchain)?);
        ledger.record(ResourceKind::ImageViews);
        Ok(())
    }

    fn attach(&mut self, dependent: Box<dyn SwapchainDependent>) {
        self.dependents.push(dependent);
    }
}

impl<W: PresentationSurface> StageDriver for VulkanStages<W> {
    fn adopted(&self) -> Vec<ResourceKind> {
        if self.window.is_some() {
            vec![ResourceKind::Window]
        } else {
            Vec::new()
        }
    }

    fn enter(&mut self, stage: Stage, ledger: &mut TeardownLedger) -> VulkanResult<()> {
        match stage {
            Stage::InstanceReady => self.create_instance(ledger),
            Stage::SurfaceReady => self.create_surface(ledger),
            Stage::DeviceReady => self.create_device(ledger),
            Stage::SwapchainReady => self.create_swapchain(ledger),
            Stage::Uninitialized | Stage::Running | Stage::TearingDown | Stage::Terminated => {
                Ok(())
            }
        }
    }

    fn release(&mut self, resource: ResourceKind) {
        match resource {
            ResourceKind::SwapchainDependents => {
                if let Some(device) = &self.device {
                    for mut dependent in self.dependents.drain(..).rev() {
                        dependent.destroy(device.raw());
                    }
                }
            }
            ResourceKind::ImageViews => {
                if let Some(mut views) = self.image_views.take() {
                    views.destroy();
                }
            }
            ResourceKind::Swapchain => {
                if let Some(mut swapchain) = self.swapchain.take() {
                    swapchain.destroy();
                }
            }
            ResourceKind::Device => {
                if let Some(mut device) = self.device.take() {
                    device.destroy();
                }
                self.selected = None;
            }
            ResourceKind::Surface => {
                if let (Some(surface), Some(instance)) = (self.surface.take(), &self.instance) {
                    instance.destroy_surface(surface);
                }
            }
            ResourceKind::Diagnostics => self.diagnostics.destroy(),
            ResourceKind::Instance => {
                if let Some(mut instance) = self.instance.take() {
                    instance.destroy();
                }
            }
            ResourceKind::Window => {
                self.window = None;
            }
        }
    }

    fn prepare_recreate(&mut self) -> VulkanResult<()> {
        self.device(Stage::Running)?.wait_idle()
    }

    fn drain_driver_messages(&mut self) -> Vec<String> {
        self.diagnostics.drain_errors()
    }
}

/// An established (or torn down) rendering context
pub struct Context<W: PresentationSurface = GlfwWindow> {
    sequencer: LifecycleSequencer<VulkanStages<W>>,
}

impl<W: PresentationSurface> Context<W> {
    /// Bootstrap a context for `window` with default settings
    pub fn bootstrap(window: W, enable_diagnostics: bool) -> Result<Self, BootstrapFailure> {
        let config = ContextConfig::default().with_diagnostics(enable_diagnostics);
        Self::bootstrap_with_config(window, config)
    }

    /// Bootstrap a context for `window` as described by `config`
    ///
    /// On failure everything created so far, the window included, has been destroyed.
    pub fn bootstrap_with_config(
        window: W,
        config: ContextConfig,
    ) -> Result<Self, BootstrapFailure> {
        log::info!(
            "Bootstrapping Vulkan context for \"{}\" (diagnostics {})",
            config.application_name,
            if config.enable_diagnostics { "on" } else { "off" }
        );
        let mut sequencer = LifecycleSequencer::new(VulkanStages::new(window, config));
        sequencer.bootstrap()?;
        Ok(Self { sequencer })
    }

    /// Rebuild the swapchain after a resize
    ///
    /// Only swapchain-scoped resources are touched. A failure leaves the context terminated.
    pub fn recreate_swapchain(&mut self) -> Result<(), BootstrapFailure> {
        self.sequencer.recreate_swapchain()
    }

    /// Destroy everything in reverse creation order
    pub fn teardown(mut self) {
        self.sequencer.teardown();
    }

    /// Current lifecycle stage
    pub fn stage(&self) -> Stage {
        self.sequencer.stage()
    }

    /// Live resources in creation order
    pub fn live_resources(&self) -> &[ResourceKind] {
        self.sequencer.live_resources()
    }

    /// Attach swapchain-scoped objects for ordered destruction
    ///
    /// Only a running context accepts dependents. On error the dependent is dropped without
    /// `destroy`, since the device it was built on is already gone or never existed.
    pub fn attach(&mut self, dependent: Box<dyn SwapchainDependent>) -> VulkanResult<()> {
        self.sequencer.record(ResourceKind::SwapchainDependents)?;
        self.sequencer.driver_mut().attach(dependent);
        Ok(())
    }

    fn stages(&self) -> &VulkanStages<W> {
        self.sequencer.driver()
    }

    /// The window the context presents to
    pub fn window(&self) -> Option<&W> {
        self.stages().window.as_ref()
    }

    /// The window, mutably, for event processing
    pub fn window_mut(&mut self) -> Option<&mut W> {
        self.sequencer.driver_mut().window.as_mut()
    }

    /// Instance context
    pub fn instance(&self) -> Option<&InstanceContext> {
        self.stages().instance.as_ref()
    }

    /// Presentation surface
    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.stages().surface
    }

    /// Selected physical device and its queue families
    pub fn physical_device(&self) -> Option<&SelectedDevice> {
        self.stages().selected.as_ref()
    }

    /// Logical device
    pub fn device(&self) -> Option<&LogicalDevice> {
        self.stages().device.as_ref()
    }

    /// Swapchain
    pub fn swapchain(&self) -> Option<&Swapchain> {
        self.stages().swapchain.as_ref()
    }

    /// Swapchain image views
    pub fn image_views(&self) -> &[vk::ImageView] {
        self.stages().image_views.as_ref().map(ImageViews::views).unwrap_or_default()
    }

    /// Whether the debug messenger is installed
    pub fn diagnostics_active(&self) -> bool {
        self.stages().diagnostics.is_active()
    }
}
