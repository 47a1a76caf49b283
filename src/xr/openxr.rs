use crate::xr::{SessionMode, XrError, XrResult, XrSystem};
use openxr::{
    ApplicationInfo, EnvironmentBlendMode, Entry, ExtensionSet, FormFactor, Instance,
    ViewConfigurationType,
};

/// Capability source backed by the local OpenXR runtime. A head-mounted
/// system counts as AR capable when it can blend with the real world.
pub struct OpenXrSystem {
    instance: Instance,
    system_id: openxr::SystemId,
}

impl OpenXrSystem {
    pub fn initialize() -> XrResult<Self> {
        // SAFETY: loading the runtime loader executes its initialisation code;
        // nothing else in this process touches the loader concurrently.
        let entry = unsafe { Entry::load() }
            .map_err(|err| XrError::Runtime(format!("failed to load OpenXR loader: {err}")))?;
        let app_info = ApplicationInfo {
            application_name: "AR Viewer",
            application_version: 1,
            engine_name: "AR Viewer",
            engine_version: 1,
        };

        let instance = entry
            .create_instance(&app_info, &ExtensionSet::default(), &[])
            .map_err(|err| XrError::Runtime(format!("failed to create OpenXR instance: {err}")))?;

        let system_id = instance
            .system(FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(|err| XrError::Runtime(format!("failed to query OpenXR system: {err}")))?;

        Ok(Self {
            instance,
            system_id,
        })
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    pub fn system_id(&self) -> openxr::SystemId {
        self.system_id
    }

    fn blend_modes(&self) -> XrResult<Vec<EnvironmentBlendMode>> {
        self.instance
            .enumerate_environment_blend_modes(self.system_id, ViewConfigurationType::PRIMARY_STEREO)
            .map_err(|err| XrError::Runtime(format!("failed to enumerate blend modes: {err}")))
    }
}

impl XrSystem for OpenXrSystem {
    fn label(&self) -> &'static str {
        "OpenXR"
    }

    async fn is_session_supported(&self, mode: SessionMode) -> XrResult<bool> {
        let modes = self.blend_modes()?;
        log::debug!("[openxr] environment blend modes {modes:?}");
        Ok(match mode {
            SessionMode::Inline => false,
            SessionMode::ImmersiveVr => modes.contains(&EnvironmentBlendMode::OPAQUE),
            SessionMode::ImmersiveAr => modes.iter().any(|mode| {
                *mode == EnvironmentBlendMode::ADDITIVE || *mode == EnvironmentBlendMode::ALPHA_BLEND
            }),
        })
    }
}
