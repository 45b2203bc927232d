//! # Declarative Derives
//!
//! The codec never inspects types at runtime; these macros write the
//! [`Wire`](crate::Wire) implementation next to the type definition.
//!
//! ```ignore
//! wire_struct! {
//!     #[derive(Debug, Default, PartialEq)]
//!     pub struct Transport {
//!         pub vehicle: Poly<dyn Vehicle> as "Vehicle",
//!         pub capacity: i64 as "Capacity" [omitempty],
//!         pub base: Base [embed],
//!         cache: u64,
//!     }
//! }
//! ```
//!
//! Field syntax: `vis name: Type [as "wire_name"] [[flag, ...]]`, with the
//! flags `omitempty` and `embed`. Only plain `pub` fields go on the wire.
//!
//! Prefix the body with `custom_json;` to route the JSON form through the
//! type's [`JsonMarshaler`](crate::JsonMarshaler) implementation.

/// Declare a struct and implement [`Wire`](crate::Wire) for it.
#[macro_export]
macro_rules! wire_struct {
    (
        custom_json;
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fattr:meta])*
                $fvis:vis $field:ident : $fty:ty $(as $wire:literal)? $([$($flag:ident),* $(,)?])?
            ),* $(,)?
        }
    ) => {
        $(#[$attr])*
        $vis struct $name {
            $( $(#[$fattr])* $fvis $field : $fty, )*
        }

        impl $crate::Wire for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Custom(
                    $crate::TypeRef::of::<$name>(),
                    ::std::boxed::Box::new($crate::Shape::Struct($crate::StructShape::new::<$name>(|| {
                        ::std::vec![$(
                            $crate::FieldSpec::new::<$fty>(
                                ::std::stringify!($field),
                                $crate::shape::is_exported(::std::stringify!($fvis)),
                            )
                            $(.rename($wire))?
                            $($(.$flag())*)?
                        ),*]
                    }))),
                )
            }

            #[allow(unused_variables)]
            fn to_value(&self, enc: $crate::Encoding) -> $crate::CodecResult<$crate::Value> {
                match enc {
                    $crate::Encoding::Json => {
                        $crate::JsonMarshaler::marshal_json(self).map($crate::Value::Json)
                    }
                    $crate::Encoding::Binary => ::std::result::Result::Ok($crate::Value::Struct(
                        ::std::vec![$(
                            $crate::shape::field_value(&self.$field, ::std::stringify!($fvis), enc)?
                        ),*],
                    )),
                }
            }

            #[allow(unused_mut, unused_variables)]
            fn from_value(
                value: $crate::Value,
                codec: &$crate::Codec,
            ) -> $crate::CodecResult<Self> {
                if let $crate::Value::Json(json) = value {
                    return <Self as $crate::JsonMarshaler>::unmarshal_json(json);
                }
                let mut slots = $crate::shape::StructSlots::new(value, ::std::stringify!($name))?;
                ::std::result::Result::Ok($name {
                    $( $field: slots.take::<$fty>(::std::stringify!($fvis), codec)?, )*
                })
            }
        }
    };

    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$fattr:meta])*
                $fvis:vis $field:ident : $fty:ty $(as $wire:literal)? $([$($flag:ident),* $(,)?])?
            ),* $(,)?
        }
    ) => {
        $(#[$attr])*
        $vis struct $name {
            $( $(#[$fattr])* $fvis $field : $fty, )*
        }

        impl $crate::Wire for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Struct($crate::StructShape::new::<$name>(|| {
                    ::std::vec![$(
                        $crate::FieldSpec::new::<$fty>(
                            ::std::stringify!($field),
                            $crate::shape::is_exported(::std::stringify!($fvis)),
                        )
                        $(.rename($wire))?
                        $($(.$flag())*)?
                    ),*]
                }))
            }

            #[allow(unused_variables)]
            fn to_value(&self, enc: $crate::Encoding) -> $crate::CodecResult<$crate::Value> {
                ::std::result::Result::Ok($crate::Value::Struct(::std::vec![$(
                    $crate::shape::field_value(&self.$field, ::std::stringify!($fvis), enc)?
                ),*]))
            }

            #[allow(unused_mut, unused_variables)]
            fn from_value(
                value: $crate::Value,
                codec: &$crate::Codec,
            ) -> $crate::CodecResult<Self> {
                let mut slots = $crate::shape::StructSlots::new(value, ::std::stringify!($name))?;
                ::std::result::Result::Ok($name {
                    $( $field: slots.take::<$fty>(::std::stringify!($fvis), codec)?, )*
                })
            }
        }
    };
}

/// Declare a single-field tuple struct that encodes exactly like the type
/// it wraps.
#[macro_export]
macro_rules! wire_newtype {
    (
        custom_json;
        $(#[$attr:meta])*
        $vis:vis struct $name:ident ( $fvis:vis $inner:ty ) ;
    ) => {
        $(#[$attr])*
        $vis struct $name($fvis $inner);

        impl $crate::Wire for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Custom(
                    $crate::TypeRef::of::<$name>(),
                    ::std::boxed::Box::new(<$inner as $crate::Wire>::shape()),
                )
            }

            fn to_value(&self, enc: $crate::Encoding) -> $crate::CodecResult<$crate::Value> {
                match enc {
                    $crate::Encoding::Json => {
                        $crate::JsonMarshaler::marshal_json(self).map($crate::Value::Json)
                    }
                    $crate::Encoding::Binary => $crate::Wire::to_value(&self.0, enc),
                }
            }

            fn from_value(
                value: $crate::Value,
                codec: &$crate::Codec,
            ) -> $crate::CodecResult<Self> {
                if let $crate::Value::Json(json) = value {
                    return <Self as $crate::JsonMarshaler>::unmarshal_json(json);
                }
                <$inner as $crate::Wire>::from_value(value, codec).map($name)
            }
        }
    };

    (
        $(#[$attr:meta])*
        $vis:vis struct $name:ident ( $fvis:vis $inner:ty ) ;
    ) => {
        $(#[$attr])*
        $vis struct $name($fvis $inner);

        impl $crate::Wire for $name {
            fn shape() -> $crate::Shape {
                $crate::Shape::Named(
                    $crate::TypeRef::of::<$name>(),
                    ::std::boxed::Box::new(<$inner as $crate::Wire>::shape()),
                )
            }

            fn to_value(&self, enc: $crate::Encoding) -> $crate::CodecResult<$crate::Value> {
                $crate::Wire::to_value(&self.0, enc)
            }

            fn from_value(
                value: $crate::Value,
                codec: &$crate::Codec,
            ) -> $crate::CodecResult<Self> {
                <$inner as $crate::Wire>::from_value(value, codec).map($name)
            }
        }
    };
}

/// Register several concrete types against one interface contract.
///
/// ```ignore
/// register_implementations!(codec, dyn Vehicle => Car, Boat, Plane)?;
/// ```
#[macro_export]
macro_rules! register_implementations {
    ($codec:expr, $iface:ty => $($concrete:ty),+ $(,)?) => {{
        let codec = &$codec;
        (|| -> $crate::CodecResult<()> {
            $(
                codec.register_implementation::<$iface, $concrete>(
                    |concrete: $concrete| -> ::std::boxed::Box<$iface> {
                        ::std::boxed::Box::new(concrete)
                    },
                )?;
            )+
            ::std::result::Result::Ok(())
        })()
    }};
}
