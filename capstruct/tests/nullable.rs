use capstruct::compile::compile;
use capstruct::surface::parse_schema;
use capstruct::{message, Args, Input, Module};

const BAR: &str = r#"
struct Bar {
  point :group {
    x @0 :Int64;
    y @1 :Int64;
  }
  maybe :group $nullable {
    isNull @2 :Bool;
    value @3 :Int32;
  }
}
"#;

fn bar() -> Module {
    compile(&parse_schema(0, BAR).unwrap()).unwrap()
}

#[test]
fn groups_accept_tuples_and_records() {
    let module = bar();
    let id = module.lookup("Bar").unwrap();

    let tuple = Args::new().with("point", Input::Tuple(vec![Input::Int(1), Input::Int(2)]));
    let instance = module.construct(id, &tuple).unwrap();
    let point = instance.reader().get("point").unwrap();
    let point = point.as_struct().unwrap();
    assert_eq!(point.get("x").unwrap().as_i64(), Some(1));
    assert_eq!(point.get("y").unwrap().as_i64(), Some(2));

    let record = Args::new().with("point", Args::new().with("y", 5i64));
    let instance = module.construct(id, &record).unwrap();
    assert_eq!(
        instance.reader().shortrepr().unwrap(),
        "(point = (x = 0, y = 5), maybe = null)",
    );
}

#[test]
fn nullable_values() {
    let module = bar();
    let id = module.lookup("Bar").unwrap();

    let set = module.construct(id, &Args::new().with("maybe", 7i32)).unwrap();
    let reader = set.reader();
    assert!(reader.has("maybe").unwrap());
    assert!(!reader.is_null("maybe").unwrap());
    assert_eq!(reader.get("maybe").unwrap().as_i64(), Some(7));

    for args in [Args::new(), Args::new().with("maybe", Input::Null)] {
        let instance = module.construct(id, &args).unwrap();
        let reader = instance.reader();
        assert!(reader.is_null("maybe").unwrap());
        assert!(reader.get("maybe").unwrap().is_null());
        let raw = reader.raw_group("maybe").unwrap();
        assert_eq!(raw.get("isNull").unwrap().as_bool(), Some(true));
        assert_eq!(raw.get("value").unwrap().as_i64(), Some(0));
    }
}

#[test]
fn nullable_values_survive_framing() {
    let module = bar();
    let id = module.lookup("Bar").unwrap();

    let instance = module.construct(id, &Args::new().with("maybe", -3i32)).unwrap();
    let bytes = message::dumps(&instance);
    let reader = message::loads(&bytes, &module, id).unwrap();
    assert_eq!(reader.get("maybe").unwrap().as_i64(), Some(-3));

    let empty = module.construct(id, &Args::new()).unwrap();
    let bytes = message::dumps(&empty);
    let reader = message::loads(&bytes, &module, id).unwrap();
    assert!(reader.get("maybe").unwrap().is_null());
}

#[test]
fn nullable_groups_hold_groups() {
    let module = compile(
        &parse_schema(
            0,
            "struct Bar {
              point :group $nullable {
                isNull @0 :Bool;
                value :group {
                  x @1 :Int64;
                  y @2 :Int64;
                }
              }
            }",
        )
        .unwrap(),
    )
    .unwrap();
    let id = module.lookup("Bar").unwrap();

    let tuple = Input::Tuple(vec![Input::Int(1), Input::Int(2)]);
    let record = Input::Record(Args::new().with("x", 1i64).with("y", 2i64));
    for point in [tuple, record] {
        let instance = module.construct(id, &Args::new().with("point", point)).unwrap();
        let reader = instance.reader();
        assert!(!reader.is_null("point").unwrap());
        assert_eq!(reader.shortrepr().unwrap(), "(point = (x = 1, y = 2))");
    }

    let empty = module.construct(id, &Args::new()).unwrap();
    assert!(empty.reader().get("point").unwrap().is_null());
}

#[test]
fn float_null_flags() {
    let module = compile(
        &parse_schema(
            0,
            "struct Foo {
              x :group $nullable {
                isNull @0 :Float32;
                value @1 :Int64;
              }
            }",
        )
        .unwrap(),
    )
    .unwrap();
    let id = module.lookup("Foo").unwrap();

    let null = module.construct(id, &Args::new().with("x", Input::Null)).unwrap();
    let reader = null.reader();
    assert!(reader.is_null("x").unwrap());
    assert!(reader.get("x").unwrap().is_null());
    let raw = reader.raw_group("x").unwrap();
    assert_eq!(raw.get("isNull").unwrap().as_f64(), Some(1.0));

    let set = module.construct(id, &Args::new().with("x", 5i64)).unwrap();
    assert!(!set.reader().is_null("x").unwrap());
    assert_eq!(set.reader().get("x").unwrap().as_i64(), Some(5));
}

fn compile_error(source: &str) -> Option<String> {
    compile(&parse_schema(0, source).unwrap()).err().map(|error| error.to_string())
}

#[test]
fn malformed_nullable_groups() {
    assert_eq!(
        compile_error(
            "struct Foo {
              x :group $nullable {
                isNull @0 :Bool;
                value @1 :Int64;
                extra @2 :Int64;
              }
            }",
        )
        .as_deref(),
        Some("x: nullable groups must have exactly two fields: \"isNull\" and \"value\""),
    );
    assert_eq!(
        compile_error(
            "struct Foo {
              x :group $nullable {
                isNull @0 :Bool;
                value @1 :Text;
              }
            }",
        )
        .as_deref(),
        Some("x: cannot use pointer types for nullable values. Pointers are already nullable."),
    );
}
