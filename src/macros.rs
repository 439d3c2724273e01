//! Value construction macros

/// Builds a [`Value::Map`](crate::foundation::Value) preserving entry
/// order.
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::record;
///
/// let input = record! { "name" => "bob", "age" => 42 };
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::foundation::Value::Map($crate::__private::IndexMap::new())
    };
    ( $( $key:expr => $value:expr ),+ $(,)? ) => {{
        let mut map = $crate::__private::IndexMap::new();
        $(
            map.insert(
                ::std::string::String::from($key),
                $crate::foundation::Value::from($value),
            );
        )+
        $crate::foundation::Value::Map(map)
    }};
}

/// Builds a [`Value::List`](crate::foundation::Value).
///
/// # Examples
///
/// ```rust,ignore
/// use trellis::list;
///
/// let input = list!["a", "b", "c"];
/// ```
#[macro_export]
macro_rules! list {
    () => {
        $crate::foundation::Value::List(::std::vec::Vec::new())
    };
    ( $( $value:expr ),+ $(,)? ) => {
        $crate::foundation::Value::List(::std::vec![
            $( $crate::foundation::Value::from($value) ),+
        ])
    };
}

#[cfg(test)]
mod tests {
    use crate::foundation::Value;

    #[test]
    fn test_record_preserves_order() {
        let value = crate::record! { "b" => 1, "a" => 2 };
        let map = value.as_map().unwrap();
        let keys: Vec<&str> = map.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a"]);
    }

    #[test]
    fn test_list_converts_elements() {
        let value = crate::list![1, "x", true];
        assert_eq!(value.get("1"), Value::from("x"));
    }

    #[test]
    fn test_empty_forms_are_blank() {
        assert!(crate::record! {}.is_blank());
        assert!(crate::list![].is_blank());
    }
}
