//! Registration rules, tag stability and sharing one codec across threads.

mod common;

use std::sync::Arc;
use std::thread;

use polycodec::{
    wire_newtype, Codec, CodecConfig, CodecError, ConcreteOptions, ErrorClass, InterfaceOptions,
    Poly, Registered, TagLayout,
};

use common::{
    codec, init_logging, register_all, tesla, Asset, Boat, Car, InsurancePlan, Plane, Transport,
    Vehicle,
};

wire_newtype! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Kind4(pub u64);
}

wire_newtype! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Kind6(pub u64);
}

wire_newtype! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Bike(pub String);
}

wire_newtype! {
    #[derive(Debug, Clone, PartialEq, Default)]
    pub struct Scooter(pub String);
}

impl Vehicle for Bike {
    fn wheels(&self) -> u32 {
        2
    }
}

impl Vehicle for Scooter {
    fn wheels(&self) -> u32 {
        2
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[test]
fn known_tags() {
    let codec = codec();
    let hex = |tag: Option<polycodec::Tag>| tag.map(|t| t.to_hex()).unwrap_or_default();
    assert_eq!(hex(codec.tag_of::<Car>()), "2b2961a431b238");
    assert_eq!(hex(codec.tag_of::<Boat>()), "25cdb46d8d2110");
    assert_eq!(hex(codec.tag_of::<Plane>()), "fad900280ce548");
    assert_eq!(hex(codec.tag_of::<Transport>()), "aeb127e121a6b0");
    assert_eq!(hex(codec.tag_of::<InsurancePlan>()), "7df0bc76182a18");
    assert!(codec.tag_of::<Bike>().is_none());
}

#[test]
fn tags_do_not_depend_on_registration_order() {
    init_logging();
    let forward = Codec::new();
    forward
        .register_concrete::<Car>("car", ConcreteOptions::default())
        .unwrap();
    forward
        .register_concrete::<Boat>("boat", ConcreteOptions::default())
        .unwrap();

    let backward = Codec::new();
    backward
        .register_concrete::<Boat>("boat", ConcreteOptions::default())
        .unwrap();
    backward
        .register_concrete::<Car>("car", ConcreteOptions::default())
        .unwrap();

    assert_eq!(forward.tag_of::<Car>(), backward.tag_of::<Car>());
    assert_eq!(forward.tag_of::<Boat>(), backward.tag_of::<Boat>());

    // Data written by one codec reads back in the other.
    let bytes = forward.marshal_binary(&Car("Tesla".into())).unwrap();
    assert_eq!(
        backward.unmarshal_binary::<Car>(&bytes).unwrap(),
        Car("Tesla".into())
    );
}

#[test]
fn colliding_tags_fail_at_registration() {
    init_logging();
    let config = CodecConfig {
        tag_layout: TagLayout::new(0, 1),
        ..CodecConfig::default()
    };
    let codec = Codec::with_config(config).unwrap();
    let tag = codec
        .register_concrete::<Kind4>("kind-4", ConcreteOptions::default())
        .unwrap();
    assert_eq!(tag.to_hex(), "10");

    let err = codec
        .register_concrete::<Kind6>("kind-6", ConcreteOptions::default())
        .unwrap_err();
    match &err {
        CodecError::DuplicateTag {
            name,
            existing,
            tag,
        } => {
            assert_eq!(name, "kind-6");
            assert_eq!(existing, "kind-4");
            assert_eq!(tag, "10");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(err.class(), ErrorClass::Configuration);
    assert!(err.is_programmer_error());
    assert!(codec.tag_of::<Kind6>().is_none());
}

// ---------------------------------------------------------------------------
// Registration Rules
// ---------------------------------------------------------------------------

#[test]
fn duplicate_registrations_are_rejected() {
    let codec = codec();

    let err = codec
        .register_concrete::<Bike>("car", ConcreteOptions::default())
        .unwrap_err();
    assert!(matches!(err, CodecError::DuplicateName { .. }));

    let err = codec
        .register_concrete::<Car>("automobile", ConcreteOptions::default())
        .unwrap_err();
    assert!(matches!(err, CodecError::DuplicateType { .. }));

    let err = codec
        .register_interface::<dyn Vehicle>(InterfaceOptions::default())
        .unwrap_err();
    assert!(matches!(err, CodecError::DuplicateContract { .. }));

    let err = codec
        .register_interface::<dyn Registered>(InterfaceOptions::default())
        .unwrap_err();
    assert!(matches!(err, CodecError::DuplicateContract { .. }));

    let err = codec
        .register_implementation::<dyn Vehicle, Car>(|car| Box::new(car))
        .unwrap_err();
    assert!(matches!(err, CodecError::DuplicateImplementation { .. }));
}

#[test]
fn implementations_need_both_sides_registered() {
    init_logging();
    let codec = Codec::new();
    let err = codec
        .register_implementation::<dyn Vehicle, Car>(|car| Box::new(car))
        .unwrap_err();
    assert!(matches!(err, CodecError::UnknownConcrete { .. }));

    codec
        .register_concrete::<Car>("car", ConcreteOptions::default())
        .unwrap();
    let err = codec
        .register_implementation::<dyn Vehicle, Car>(|car| Box::new(car))
        .unwrap_err();
    assert!(matches!(err, CodecError::UnknownContract { .. }));
}

#[test]
fn unregistered_and_unassociated_types_fail_to_encode() {
    let codec = codec();
    codec
        .register_concrete::<Bike>("bike", ConcreteOptions::default())
        .unwrap();

    let bike = Poly::<dyn Vehicle>::new(Box::new(Bike("fixie".into())));
    let err = codec.marshal_json(&bike).unwrap_err();
    assert!(matches!(err, CodecError::NotImplemented { .. }));
    assert_eq!(err.class(), ErrorClass::Unregistered);
    assert!(!err.is_programmer_error());

    let scooter = Poly::<dyn Vehicle>::new(Box::new(Scooter("vespa".into())));
    let err = codec.marshal_binary(&scooter).unwrap_err();
    assert!(matches!(err, CodecError::UnregisteredType { .. }));

    // Any registered type fits the catch-all interface.
    let any = Poly::<dyn Registered>::new(Box::new(Bike("fixie".into())));
    let bytes = codec.marshal_binary(&any).unwrap();
    let back: Poly<dyn Registered> = codec.unmarshal_binary(&bytes).unwrap();
    assert_eq!(back.downcast_ref::<Bike>(), Some(&Bike("fixie".into())));
}

#[test]
fn late_registration_is_picked_up() {
    let codec = codec();
    let bike = Poly::<dyn Vehicle>::new(Box::new(Bike("bmx".into())));
    assert!(codec.marshal_json(&bike).is_err());

    codec
        .register_concrete::<Bike>("bike", ConcreteOptions::default())
        .unwrap();
    codec
        .register_implementation::<dyn Vehicle, Bike>(|bike| Box::new(bike))
        .unwrap();

    let json = codec.marshal_json(&bike).unwrap();
    assert_eq!(json, r#"{"type":"163c18e0068f08","value":"bmx"}"#);
    let back: Poly<dyn Vehicle> = codec.unmarshal_json(&json).unwrap();
    assert_eq!(back.get().map(|v| v.wheels()), Some(2));
}

#[test]
fn lookups_describe_the_registry() {
    let codec = codec();
    let registry = codec.registry();
    assert_eq!(registry.len(), 5);

    let car = registry.concrete_by_name("car").unwrap();
    assert_eq!(car.tag.to_hex(), "2b2961a431b238");
    assert!(car.options.tag_top_level);
    let by_tag = registry.concrete_by_tag(&car.tag).unwrap();
    assert_eq!(by_tag.name, "car");

    let vehicle = registry.contract::<dyn Vehicle>().unwrap();
    assert_eq!(vehicle.members.len(), 3);
    assert!(!vehicle.options.always_disambiguate);

    let contracts = registry.contracts_of::<Car>();
    assert_eq!(contracts.len(), 2);
    assert!(contracts.contains(&polycodec::TypeRef::of::<dyn Vehicle>()));
    assert!(contracts.contains(&polycodec::TypeRef::of::<dyn Asset>()));
    assert!(registry.contracts_of::<Plane>().len() == 1);
}

#[test]
fn untagged_top_level_option() {
    init_logging();
    let codec = Codec::new();
    codec
        .register_concrete::<Car>(
            "car",
            ConcreteOptions {
                tag_top_level: false,
            },
        )
        .unwrap();
    assert_eq!(codec.marshal_json(&Car("Tesla".into())).unwrap(), r#""Tesla""#);
    assert_eq!(
        codec.marshal_binary_bare(&Car("Tesla".into())).unwrap(),
        vec![5, b'T', b'e', b's', b'l', b'a']
    );
}

#[test]
fn config_loads_from_partial_json() {
    let config: CodecConfig = serde_json::from_str(r#"{"allow_floats":true}"#).unwrap();
    assert!(config.allow_floats);
    assert_eq!(config.max_depth, CodecConfig::default().max_depth);
    assert_eq!(config.tag_layout, TagLayout::default());
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn one_codec_many_threads() {
    let codec = Arc::new(codec());
    let handles: Vec<_> = (0..8)
        .map(|worker| {
            let codec = Arc::clone(&codec);
            thread::spawn(move || {
                for round in 0..100i64 {
                    let transport = Transport {
                        vehicle: if round % 2 == 0 {
                            tesla()
                        } else {
                            Poly::<dyn Vehicle>::new(Box::new(Boat {
                                name: format!("boat-{worker}"),
                                sails: round as u32,
                            }))
                        },
                        capacity: worker * 1_000 + round,
                    };
                    let bytes = codec.marshal_binary(&transport).unwrap();
                    let back: Transport = codec.unmarshal_binary(&bytes).unwrap();
                    assert_eq!(back, transport);

                    let json = codec.marshal_json(&transport).unwrap();
                    let back: Transport = codec.unmarshal_json(&json).unwrap();
                    assert_eq!(back, transport);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn registration_races_with_encoding() {
    init_logging();
    let codec = Arc::new(Codec::new());
    register_all(&codec, InterfaceOptions::default()).unwrap();

    let reader = {
        let codec = Arc::clone(&codec);
        thread::spawn(move || {
            for _ in 0..500 {
                let bytes = codec.marshal_binary(&tesla()).unwrap();
                let back: Poly<dyn Vehicle> = codec.unmarshal_binary(&bytes).unwrap();
                assert_eq!(back, tesla());
            }
        })
    };
    codec
        .register_concrete::<Bike>("bike", ConcreteOptions::default())
        .unwrap();
    codec
        .register_implementation::<dyn Vehicle, Bike>(|bike| Box::new(bike))
        .unwrap();
    reader.join().unwrap();
    assert!(codec.tag_of::<Bike>().is_some());
}
