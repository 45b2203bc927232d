//! Shared fixtures for the integration tests: two interface contracts, a
//! handful of concrete types, and a fully registered codec.

#![allow(dead_code)]

use std::sync::Once;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use polycodec::{
    register_implementations, wire_newtype, wire_struct, Codec, CodecConfig, CodecError,
    CodecResult, ConcreteOptions, InterfaceOptions, JsonMarshaler, Poly, Registered,
};

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

static LOGGING: Once = Once::new();

/// Route library logs through the test harness. `RUST_LOG` overrides the
/// default `warn` level.
pub fn init_logging() {
    LOGGING.call_once(|| {
        let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(true).with_test_writer())
            .try_init();
    });
}

// ---------------------------------------------------------------------------
// Contracts
// ---------------------------------------------------------------------------

pub trait Vehicle: Registered {
    fn wheels(&self) -> u32;
}

pub trait Asset: Registered {
    fn appraisal(&self) -> u64;
}

// ---------------------------------------------------------------------------
// Concrete Types
// ---------------------------------------------------------------------------

wire_newtype! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Car(pub String);
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Boat {
        pub name: String as "Name",
        pub sails: u32 as "Sails" [omitempty],
    }
}

wire_struct! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Plane {
        pub model: String as "Model",
        pub engines: u8 as "Engines",
        pub ceiling: Option<i64> as "Ceiling",
        pub certified_at: DateTime<Utc> as "CertifiedAt",
        pub manifest: Vec<String> as "Manifest" [omitempty],
    }
}

wire_struct! {
    #[derive(Debug, PartialEq, Default)]
    pub struct Transport {
        pub vehicle: Poly<dyn Vehicle> as "Vehicle",
        pub capacity: i64 as "Capacity",
    }
}

wire_struct! {
    #[derive(Debug, PartialEq, Default)]
    pub struct InsurancePlan {
        pub holder: String as "Holder",
        pub covered: Vec<Poly<dyn Asset>> as "Covered",
        pub rider: Poly<dyn Registered> as "Rider",
    }
}

impl Vehicle for Car {
    fn wheels(&self) -> u32 {
        4
    }
}

impl Vehicle for Boat {
    fn wheels(&self) -> u32 {
        0
    }
}

impl Vehicle for Plane {
    fn wheels(&self) -> u32 {
        3
    }
}

impl Asset for Car {
    fn appraisal(&self) -> u64 {
        20_000
    }
}

impl Asset for Boat {
    fn appraisal(&self) -> u64 {
        5_000 * u64::from(self.sails.max(1))
    }
}

// ---------------------------------------------------------------------------
// Custom JSON
// ---------------------------------------------------------------------------

wire_newtype! {
    custom_json;
    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct Celsius(pub i64);
}

/// Renders as `"21C"` in JSON, plain integer in binary.
impl JsonMarshaler for Celsius {
    fn marshal_json(&self) -> CodecResult<serde_json::Value> {
        Ok(json!(format!("{}C", self.0)))
    }

    fn unmarshal_json(json: serde_json::Value) -> CodecResult<Self> {
        match json {
            serde_json::Value::Null => Ok(Celsius::default()),
            serde_json::Value::String(text) => text
                .strip_suffix('C')
                .and_then(|digits| digits.parse().ok())
                .map(Celsius)
                .ok_or_else(|| CodecError::custom(format!("bad temperature {text:?}"))),
            other => Err(CodecError::custom(format!("bad temperature {other}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Codec Setup
// ---------------------------------------------------------------------------

pub fn codec() -> Codec {
    codec_with(CodecConfig::default())
}

/// A codec with every fixture type registered.
pub fn codec_with(config: CodecConfig) -> Codec {
    init_logging();
    let codec = Codec::with_config(config).expect("valid config");
    register_all(&codec, InterfaceOptions::default()).expect("fixture registration");
    codec
}

pub fn register_all(codec: &Codec, vehicle_options: InterfaceOptions) -> CodecResult<()> {
    codec.register_interface::<dyn Vehicle>(vehicle_options)?;
    codec.register_interface::<dyn Asset>(InterfaceOptions::default())?;

    codec.register_concrete::<Car>("car", ConcreteOptions::default())?;
    codec.register_concrete::<Boat>("boat", ConcreteOptions::default())?;
    codec.register_concrete::<Plane>("plane", ConcreteOptions::default())?;
    codec.register_concrete::<Transport>("our/transport", ConcreteOptions::default())?;
    codec.register_concrete::<InsurancePlan>("insuranceplan", ConcreteOptions::default())?;

    register_implementations!(codec, dyn Vehicle => Car, Boat, Plane)?;
    register_implementations!(codec, dyn Asset => Car, Boat)?;
    Ok(())
}

pub fn tesla() -> Poly<dyn Vehicle> {
    Poly::<dyn Vehicle>::new(Box::new(Car("Tesla".into())))
}

pub fn sample_plane() -> Plane {
    Plane {
        model: "A320".into(),
        engines: 2,
        ceiling: Some(39_800),
        certified_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 250_000_000)
            .expect("valid timestamp"),
        manifest: vec!["crew".into(), "cargo".into()],
    }
}
