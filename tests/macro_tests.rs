use kat::{data, encode, Data, DataMap};

#[test]
fn test_data_macro_null() {
    let value = data!(null);
    assert_eq!(value, Data::Null);
}

#[test]
fn test_data_macro_booleans() {
    assert_eq!(data!(true), Data::Bool(true));
    assert_eq!(data!(false), Data::Bool(false));
}

#[test]
fn test_data_macro_numbers() {
    assert_eq!(data!(42), Data::Int(42));
    assert_eq!(data!(3.5), Data::Float(3.5));
    assert_eq!(data!(-123), Data::Int(-123));
    assert_eq!(data!(u64::MAX), Data::BigInt(u64::MAX.into()));
}

#[test]
fn test_data_macro_strings() {
    assert_eq!(data!("hello"), Data::Text("hello".to_string()));
    assert_eq!(data!(""), Data::Text(String::new()));
}

#[test]
fn test_data_macro_lists() {
    assert_eq!(data!([]), Data::List(vec![]));
    assert_eq!(
        data!([1, "two", true, null]),
        Data::List(vec![
            Data::Int(1),
            Data::Text("two".into()),
            Data::Bool(true),
            Data::Null
        ])
    );
}

#[test]
fn test_data_macro_maps_keep_order() {
    let value = data!({ "z": 1, "a": 2, "m": 3 });
    let keys: Vec<&String> = value.as_map().unwrap().keys().collect();
    assert_eq!(keys, vec!["z", "a", "m"]);
}

#[test]
fn test_data_macro_nested() {
    let value = data!({
        "user": { "id": 1, "roles": ["admin", "dev"] },
        "empty": {}
    });

    let mut user = DataMap::new();
    user.insert("id".to_string(), Data::Int(1));
    user.insert(
        "roles".to_string(),
        Data::List(vec![Data::Text("admin".into()), Data::Text("dev".into())]),
    );
    assert_eq!(value.get("user"), Some(&Data::Map(user)));
    assert_eq!(value.get("empty"), Some(&Data::Map(DataMap::new())));
}

#[test]
fn test_data_macro_expressions() {
    let name = "kraity";
    let ids = vec![1, 2];
    let value = data!({ "name": name, "ids": ids });
    assert_eq!(value.get("name").and_then(Data::as_str), Some("kraity"));
    assert_eq!(
        value.get("ids"),
        Some(&Data::List(vec![Data::Int(1), Data::Int(2)]))
    );
}

#[test]
fn test_data_macro_encodes() {
    let value = data!({ "id": 1, "note": "a(b)" });
    assert_eq!(encode(&value).unwrap(), "M{l:id(1)s:note(a^(b^))}");
    assert_eq!(value.to_string(), "M{l:id(1)s:note(a^(b^))}");
}
