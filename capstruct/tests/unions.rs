use capstruct::compile::compile;
use capstruct::surface::parse_schema;
use capstruct::{message, Args, ConstructError, Module, ReadError, Variant};

const SHAPES: &str = r#"
struct Shape {
  area @0 :Float64;
  union {
    square @1 :Float64;
    circle @2 :Text;
  }
}
"#;

fn shapes() -> Module {
    compile(&parse_schema(0, SHAPES).unwrap()).unwrap()
}

#[test]
fn general_constructor_selects_the_supplied_member() {
    let module = shapes();
    let shape = module.lookup("Shape").unwrap();

    let args = Args::new().with("area", 4.0).with("square", 2.0);
    let instance = module.construct(shape, &args).unwrap();
    let reader = instance.reader();

    assert_eq!(reader.which().unwrap(), 0);
    assert!(reader.is("square").unwrap());
    assert!(!reader.is("circle").unwrap());
    assert_eq!(reader.get("square").unwrap().as_f64(), Some(2.0));
    assert_eq!(reader.get("area").unwrap().as_f64(), Some(4.0));
    assert_eq!(
        reader.get("circle").unwrap_err(),
        ReadError::InactiveUnionMember {
            field: "circle".to_owned(),
            active: "square".to_owned(),
        },
    );
    assert_eq!(reader.shortrepr().unwrap(), "(area = 4.0, square = 2.0)");
}

#[test]
fn member_factories_stamp_their_tag() {
    let module = shapes();
    let shape = module.lookup("Shape").unwrap();

    let circle = module
        .construct_member(shape, "circle", &Args::new().with("circle", "round"))
        .unwrap();
    let reader = circle.reader();
    assert_eq!(reader.active_member().unwrap(), Some("circle"));
    assert_eq!(reader.get("circle").unwrap().as_text(), Some("round"));
    assert_eq!(reader.get("area").unwrap().as_f64(), Some(0.0));

    // Factories take every argument as optional.
    let empty = module.construct_member(shape, "circle", &Args::new()).unwrap();
    assert_eq!(empty.reader().shortrepr().unwrap(), r#"(area = 0.0, circle = "")"#);

    let variant = Variant::new("square", 3.0);
    let square = module
        .construct_variant(shape, &variant, &Args::new().with("area", 9.0))
        .unwrap();
    assert_eq!(square.reader().shortrepr().unwrap(), "(area = 9.0, square = 3.0)");
}

#[test]
fn general_constructor_errors() {
    let module = shapes();
    let shape = module.lookup("Shape").unwrap();

    let missing = module.construct(shape, &Args::new().with("area", 1.0)).unwrap_err();
    assert_eq!(
        missing.to_string(),
        "one of the following args is required: square, circle",
    );

    let both = Args::new()
        .with("area", 1.0)
        .with("circle", "c")
        .with("square", 1.0);
    assert_eq!(
        module.construct(shape, &both).unwrap_err(),
        ConstructError::ConflictingUnionMembers {
            first: "square".to_owned(),
            second: "circle".to_owned(),
        },
    );

    let no_area = module.construct(shape, &Args::new().with("square", 1.0)).unwrap_err();
    assert_eq!(
        no_area,
        ConstructError::MissingArgument {
            field: "area".to_owned(),
        },
    );

    let unknown = module.construct_member(shape, "triangle", &Args::new()).unwrap_err();
    assert_eq!(unknown.to_string(), "Shape: no union member named `triangle`");
}

#[test]
fn unknown_tags_read_as_no_member() {
    let module = shapes();
    let shape = module.lookup("Shape").unwrap();

    let instance = module
        .construct(shape, &Args::new().with("area", 1.0).with("square", 1.0))
        .unwrap();
    let mut bytes = message::dumps(&instance);
    // The tag lives at data[8..10], after the header and root pointer.
    bytes[16 + 8] = 7;

    let reader = message::loads(&bytes, &module, shape).unwrap();
    assert_eq!(reader.which().unwrap(), 7);
    assert_eq!(reader.active_member().unwrap(), None);
    assert_eq!(reader.shortrepr().unwrap(), "(area = 1.0)");
}
