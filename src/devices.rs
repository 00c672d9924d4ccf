use serde::Serialize;

/// A named emulation preset applied to one audit run. The set is fixed: the
/// matrix always runs `mobile` then `desktop`, nothing user-configurable.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceProfile {
    pub name: String,
    pub form_factor: FormFactor,
    pub screen_emulation: ScreenEmulation,
    pub user_agent: String,
    pub throttling: Throttling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FormFactor {
    Mobile,
    Desktop,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScreenEmulation {
    pub disabled: bool,
    pub width: u32,
    pub height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
}

/// Network/cpu throttling parameters. Audits run with throttling disabled
/// (all zeroes) so results track the host network, not emulated conditions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Throttling {
    pub rtt_ms: u32,
    pub throughput_kbps: u32,
    pub cpu_slowdown_multiplier: u32,
    pub request_latency_ms: u32,
    pub download_throughput_kbps: u32,
    pub upload_throughput_kbps: u32,
}

impl Throttling {
    pub fn disabled() -> Self {
        Throttling {
            rtt_ms: 0,
            throughput_kbps: 0,
            cpu_slowdown_multiplier: 1,
            request_latency_ms: 0,
            download_throughput_kbps: 0,
            upload_throughput_kbps: 0,
        }
    }
}

lazy_static! {
    /// The two built-in profiles, in the order the matrix runs them.
    pub static ref DEVICE_PROFILES: Vec<DeviceProfile> = vec![
        DeviceProfile {
            name: "mobile".into(),
            form_factor: FormFactor::Mobile,
            screen_emulation: ScreenEmulation {
                disabled: false,
                width: 375,
                height: 812,
                device_scale_factor: 3.0,
                mobile: true,
            },
            user_agent: "Mozilla/5.0 (iPhone; CPU iPhone OS 10_3 like Mac OS X)".into(),
            throttling: Throttling::disabled(),
        },
        DeviceProfile {
            name: "desktop".into(),
            form_factor: FormFactor::Desktop,
            screen_emulation: ScreenEmulation {
                disabled: true,
                width: 1920,
                height: 1080,
                device_scale_factor: 1.0,
                mobile: false,
            },
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64)".into(),
            throttling: Throttling::disabled(),
        },
    ];
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn profiles_are_mobile_then_desktop() {
        assert_eq!(DEVICE_PROFILES.len(), 2);
        assert_eq!(DEVICE_PROFILES[0].name, "mobile");
        assert_eq!(DEVICE_PROFILES[1].name, "desktop");
        assert!(!DEVICE_PROFILES[0].screen_emulation.disabled);
        assert!(DEVICE_PROFILES[1].screen_emulation.disabled);
    }

    #[test]
    fn throttling_is_disabled_on_both() {
        for profile in DEVICE_PROFILES.iter() {
            assert_eq!(profile.throttling.rtt_ms, 0);
            assert_eq!(profile.throttling.cpu_slowdown_multiplier, 1);
        }
    }
}
