use pretty_assertions::assert_eq;

use super::*;

fn convert(ty: &IrType) -> Option<IrType> {
    TargetTypeConverter::default().convert_type(ty)
}

#[test]
fn scalars_are_unchanged() {
    assert_eq!(convert(&IrType::I32), Some(IrType::I32));
    assert_eq!(convert(&IrType::Float(64)), Some(IrType::Float(64)));
    assert_eq!(convert(&IrType::I1), Some(IrType::I1));
}

#[test]
fn index_follows_configured_width() {
    assert_eq!(convert(&IrType::Index), Some(IrType::I64));
    assert_eq!(
        TargetTypeConverter::new(32).convert_type(&IrType::Index),
        Some(IrType::I32)
    );
}

#[test]
fn logical_becomes_integer_of_its_size() {
    assert_eq!(convert(&IrType::Logical(1)), Some(IrType::I8));
    assert_eq!(convert(&IrType::Logical(4)), Some(IrType::I32));
}

#[test]
fn references_become_pointers() {
    assert_eq!(
        convert(&IrType::reference(IrType::Index)),
        Some(IrType::ptr(IrType::I64))
    );
    assert_eq!(
        convert(&IrType::seq(IrType::Logical(1))),
        Some(IrType::ptr(IrType::I8))
    );
    assert_eq!(
        convert(&IrType::Box(Box::new(IrType::Float(32)))),
        Some(IrType::ptr(IrType::Float(32)))
    );
}

#[test]
fn memref_becomes_descriptor() {
    assert_eq!(
        convert(&IrType::memref(IrType::Float(64))),
        Some(IrType::Struct(vec![
            IrType::ptr(IrType::Float(64)),
            IrType::ptr(IrType::Float(64)),
            IrType::I64,
        ]))
    );
}

#[test]
fn opaque_has_no_rule() {
    let opaque = IrType::Opaque("derived".to_owned());
    assert_eq!(convert(&opaque), None);
    assert_eq!(convert(&IrType::reference(opaque.clone())), None);
    assert_eq!(convert(&IrType::Struct(vec![IrType::I32, opaque])), None);
}

#[test]
fn conversion_is_idempotent() {
    let converter = TargetTypeConverter::default();
    for ty in [
        IrType::Index,
        IrType::reference(IrType::Logical(4)),
        IrType::memref(IrType::I32),
        IrType::seq(IrType::reference(IrType::Index)),
    ] {
        let once = converter.convert_type(&ty).unwrap();
        assert!(converter.is_legal(&once), "{once}");
        assert_eq!(converter.convert_type(&once), Some(once.clone()));
    }
}

#[test]
fn host_types_are_illegal() {
    let converter = TargetTypeConverter::default();
    assert!(!converter.is_legal(&IrType::Index));
    assert!(!converter.is_legal(&IrType::reference(IrType::I32)));
    assert!(converter.is_legal(&IrType::ptr(IrType::I32)));
}
