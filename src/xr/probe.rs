use crate::xr::{SessionMode, XrSystem};

/// Asks the platform, once, whether it can host `mode`. A missing platform, a
/// negative answer and a failing query all collapse to `false`.
pub async fn probe_session_support<S: XrSystem>(platform: Option<&S>, mode: SessionMode) -> bool {
    let Some(platform) = platform else {
        log::info!("[probe] no xr platform available; {mode} unsupported");
        return false;
    };

    match platform.is_session_supported(mode).await {
        Ok(supported) => {
            log::info!(
                "[probe] {} reports {mode} {}",
                platform.label(),
                if supported { "supported" } else { "unsupported" }
            );
            supported
        }
        Err(err) => {
            log::warn!("[probe] {} support query failed: {err}", platform.label());
            false
        }
    }
}

pub async fn is_immersive_ar_supported<S: XrSystem>(platform: Option<&S>) -> bool {
    probe_session_support(platform, SessionMode::ImmersiveAr).await
}
