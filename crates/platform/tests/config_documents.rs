//! Settings documents as they are stored on the device.

#![cfg(feature = "serde")]
#![allow(clippy::unwrap_used, clippy::float_cmp)]

use platform::{ChannelLimits, ConfigStore, InterrupterLimits, StaticConfigStore};

#[test]
fn store_survives_a_round_trip() {
    let store = StaticConfigStore::uniform(
        ChannelLimits {
            max_duty_pct: 2.5,
            max_on_time_us: 150,
            min_on_time_us: 30,
        },
        3,
    )
    .with_banned(&[60, 120, 180]);

    let json = serde_json::to_string(&store).unwrap();
    let back: StaticConfigStore = serde_json::from_str(&json).unwrap();
    assert_eq!(back, store);
    assert_eq!(back.channel_limits(2).min_on_time_us, 30);
    assert_eq!(back.channel_limits(3), ChannelLimits::default());
    assert_eq!(back.banned_frequencies(), [60, 120, 180]);
}

#[test]
fn partial_limits_fill_from_defaults() {
    let limits: ChannelLimits = serde_json::from_str(r#"{ "min_on_time_us": 40 }"#).unwrap();
    assert_eq!(limits.min_on_time_us, 40);
    assert_eq!(limits.max_on_time_us, ChannelLimits::default().max_on_time_us);

    let ranges: InterrupterLimits = serde_json::from_str(r#"{ "max_freq_hz": 400 }"#).unwrap();
    assert_eq!(ranges.max_freq_hz, 400);
    assert_eq!(ranges.max_duty_pct, 5.0);
}

#[test]
fn too_many_channels_rejected() {
    let channels = vec![serde_json::json!({}); 9];
    let doc = serde_json::json!({ "channels": channels }).to_string();
    assert!(serde_json::from_str::<StaticConfigStore>(&doc).is_err());
}
