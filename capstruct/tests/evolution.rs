//! Readers and writers built from different versions of a schema.

use capstruct::compile::compile;
use capstruct::surface::parse_schema;
use capstruct::{message, Args, Module, ReadError};

fn module(source: &str) -> Module {
    compile(&parse_schema(0, source).unwrap()).unwrap()
}

const OLD: &str = "struct Point { x @0 :Int64; y @1 :Int64; }";
const NEW: &str = "struct Point { x @0 :Int64; y @1 :Int64; z @2 :Int64 = 42; name @3 :Text; }";

#[test]
fn new_fields_read_as_defaults() {
    let old = module(OLD);
    let new = module(NEW);
    let (old_id, new_id) = (old.lookup("Point").unwrap(), new.lookup("Point").unwrap());

    let instance = old.construct(old_id, &Args::new().with("x", 1i64).with("y", 2i64)).unwrap();
    let bytes = message::dumps(&instance);

    let reader = message::loads(&bytes, &new, new_id).unwrap();
    assert_eq!(reader.data_size(), 2);
    assert_eq!(reader.get("z").unwrap().as_i64(), Some(42));
    assert!(!reader.has("name").unwrap());
    assert_eq!(reader.shortrepr().unwrap(), "(x = 1, y = 2, z = 42)");
}

#[test]
fn old_readers_ignore_new_fields() {
    let old = module(OLD);
    let new = module(NEW);
    let (old_id, new_id) = (old.lookup("Point").unwrap(), new.lookup("Point").unwrap());

    let args = Args::new().with("x", 1i64).with("y", 2i64).with("z", 3i64).with("name", "p");
    let bytes = message::dumps(&new.construct(new_id, &args).unwrap());

    let reader = message::loads(&bytes, &old, old_id).unwrap();
    assert_eq!((reader.data_size(), reader.ptrs_size()), (3, 1));
    assert_eq!(reader.shortrepr().unwrap(), "(x = 1, y = 2)");
    assert!(matches!(reader.get("z"), Err(ReadError::NoSuchField { .. })));
}

#[test]
fn null_pointers_read_as_defaults() {
    let module = module(
        r#"struct Tree {
            struct Leaf { value @0 :Int32 = -1; }
            leaves @0 :List(Leaf);
            children @1 :List(Tree);
            name @2 :Text = "root";
        }"#,
    );
    let tree = module.lookup("Tree").unwrap();

    let zeroes = [0; 24];
    for reader in [module.from_buffer(tree, &zeroes, 0, 0, 3), module.from_buffer(tree, &[], 0, 0, 0)] {
        assert!(!reader.has("leaves").unwrap());
        assert!(reader.get("name").unwrap().is_null());
        assert_eq!(reader.get_or_default("name").unwrap().as_text(), Some("root"));
        let leaves = reader.get_or_default("leaves").unwrap();
        assert!(leaves.as_list().unwrap().is_empty());
        assert_eq!(reader.shortrepr().unwrap(), "()");
    }

    let leaf = module.lookup("Tree.Leaf").unwrap();
    assert_eq!(module.lookup("Tree_Leaf"), Some(leaf));
    assert_eq!(module.from_buffer(leaf, &[], 0, 0, 0).get("value").unwrap().as_i64(), Some(-1));
}

#[test]
fn null_struct_pointers_read_as_zeroed_structs() {
    let module = module(
        "struct P { a @0 :Int64; b @1 :Int64; }
        struct Foo { x @0 :Text; y @1 :List(Int64); z @2 :P; }",
    );
    let foo = module.lookup("Foo").unwrap();

    let zeroes = [0; 24];
    for reader in [module.from_buffer(foo, &zeroes, 0, 0, 3), module.from_buffer(foo, &[], 0, 0, 0)] {
        for field in ["x", "y", "z"] {
            assert!(!reader.has(field).unwrap());
            assert!(reader.get(field).unwrap().is_null());
        }
        assert_eq!(reader.get_or_default("x").unwrap().as_text(), Some(""));
        assert!(reader.get_or_default("y").unwrap().as_list().unwrap().is_empty());
        let z = reader.get_or_default("z").unwrap();
        let z = z.as_struct().unwrap();
        assert_eq!(z.get("a").unwrap().as_i64(), Some(0));
        assert_eq!(z.get("b").unwrap().as_i64(), Some(0));
        assert_eq!(z.shortrepr().unwrap(), "(a = 0, b = 0)");
    }
}
