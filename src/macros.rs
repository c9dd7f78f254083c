/// Builds a [`Data`](crate::Data) tree from a JSON-like literal.
///
/// ```rust
/// use kat::{data, encode};
///
/// let value = data!({ "id": 1, "tags": ["a", "b"], "draft": false, "note": null });
/// assert_eq!(encode(&value).unwrap(), "M{l:id(1)L:tags{s(a)s(b)}b:draft(false)$:note()}");
/// ```
#[macro_export]
macro_rules! data {
    (null) => {
        $crate::Data::Null
    };

    (true) => {
        $crate::Data::Bool(true)
    };

    (false) => {
        $crate::Data::Bool(false)
    };

    ([]) => {
        $crate::Data::List(vec![])
    };

    ([ $($elem:tt),* $(,)? ]) => {
        $crate::Data::List(vec![$($crate::data!($elem)),*])
    };

    ({}) => {
        $crate::Data::Map($crate::DataMap::new())
    };

    ({ $($key:literal : $value:tt),* $(,)? }) => {{
        let mut map = $crate::DataMap::new();
        $(
            map.insert($key.to_string(), $crate::data!($value));
        )*
        $crate::Data::Map(map)
    }};

    // any other serializable expression
    ($s:expr) => {{
        $crate::to_data(&$s).unwrap_or($crate::Data::Null)
    }};
}

/// Implements [`Encode`](crate::Encode) for types written through a codec
/// registered for them, such as a [`Sketch`](crate::Sketch) or an
/// [`EnumCodec`](crate::codecs::EnumCodec).
///
/// ```rust
/// use kat::{impl_encode, Encode};
///
/// struct Ticket { id: u32 }
/// impl_encode!(Ticket);
///
/// let ticket = Ticket { id: 1 };
/// assert!(ticket.as_any().downcast_ref::<Ticket>().is_some());
/// ```
#[macro_export]
macro_rules! impl_encode {
    ($($ty:ty),+ $(,)?) => {
        $(
            impl $crate::Encode for $ty {
                fn as_any(&self) -> &dyn ::std::any::Any {
                    self
                }
            }
        )+
    };
}
