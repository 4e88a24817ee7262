//! Registry, element and attribute behaviour over the scene fixtures.

mod common;

use common::{registry, spot_light, Light, SceneNode, ShadowAttribute, Transform};
use glam::Vec3;
use reflect::attribute::AttributeCollection;
use reflect::prelude::*;

// === Registry ===

#[test]
fn test_registry_lookup() {
    let registry = registry();

    let light = registry.get_class("Light").expect("Light not registered");
    let names: Vec<_> = light.chain().map(|c| c.name().to_owned()).collect();
    assert_eq!(names, ["Light", "Transform", "SceneNode", "AttributeCollection"]);

    let fields: Vec<_> = light.all_fields().iter().map(|f| f.name().to_owned()).collect();
    assert_eq!(fields.first().map(String::as_str), Some("m_Attributes"));
    assert_eq!(fields.last().map(String::as_str), Some("m_Target"));

    assert!(registry.get_class_of::<SceneNode>().expect("SceneNode").is_abstract());
    assert!(registry.get_enumeration("LightType").is_some());

    let derived = registry.derived_classes("Transform").expect("Failed to list derived");
    assert!(derived.iter().any(|c| c.name() == "Light"));
}

#[test]
fn test_registry_errors() {
    let mut registry = registry();

    assert!(matches!(registry.get_class("Camera"), Err(Error::UnknownType(_))));
    assert!(matches!(
        registry.create_instance("SceneNode"),
        Err(Error::AbstractInstantiation(_))
    ));
    assert!(matches!(
        registry.register_class::<Light>("Light"),
        Err(Error::DuplicateType(_))
    ));

    let mut empty = Registry::new();
    assert!(matches!(
        empty.register_class::<Transform>("Transform"),
        Err(Error::BaseNotRegistered { .. })
    ));
}

// === Elements ===

#[test]
fn test_cast_follows_base_chain() {
    let registry = registry();
    let light = spot_light(&registry);

    assert!(light.try_cast::<Transform>().is_some());
    assert!(light.try_cast::<SceneNode>().is_some());
    assert!(light.try_cast::<ShadowAttribute>().is_none());

    let transform = registry.create::<Transform>().expect("Failed to create Transform");
    assert!(matches!(transform.cast::<Light>(), Err(Error::InvalidCast { .. })));
}

#[test]
fn test_fields_by_name() {
    let registry = registry();
    let light = spot_light(&registry);

    light
        .set_field("m_Intensity", Value::F32(8.0))
        .expect("Failed to set intensity");
    light
        .set_field("m_Name", Value::String("fill".into()))
        .expect("Failed to set base field");

    assert_eq!(light.get_field("m_Intensity").expect("intensity"), Value::F32(8.0));
    assert_eq!(light.cast::<SceneNode>().expect("SceneNode cast").name, "fill");
    assert!(matches!(
        light.get_field("m_Missing"),
        Err(Error::FieldNotFound { .. })
    ));
}

#[test]
fn test_deep_clone_is_idempotent() {
    let registry = registry();
    let light = spot_light(&registry);

    let once = light.deep_clone().expect("Failed to clone");
    let twice = once.deep_clone().expect("Failed to clone clone");

    assert!(once.field_equals(&light));
    assert!(twice.field_equals(&once));
    assert_ne!(once.uid(), light.uid());
    assert_ne!(twice.uid(), once.uid());

    // Owned attributes are copied, not shared.
    let original = light.children();
    let copied = once.children();
    assert_eq!(original.len(), 1);
    assert!(!ElementPtr::ptr_eq(&original[0], &copied[0]));
}

#[test]
fn test_visit_reaches_attributes() {
    let registry = registry();
    let light = spot_light(&registry);

    let mut elements = Vec::new();
    light.visit(&mut |step| {
        if let reflect::reflect::Visit::Element { element, depth } = step {
            elements.push((element.type_name().to_owned(), depth));
        }
    });
    assert_eq!(
        elements,
        [("Light".to_owned(), 0), ("ShadowAttribute".to_owned(), 1)]
    );
}

// === Attributes ===

#[test]
fn test_editor_leaves_shared_default_untouched() {
    let registry = registry();

    // A class-level default owned by a prototype.
    let prototype = registry.create::<Light>().expect("Failed to create prototype");
    let shared = registry
        .wrap(ShadowAttribute {
            softness: 0.5,
            ..Default::default()
        })
        .expect("Failed to create ShadowAttribute");
    prototype
        .cast_mut::<AttributeCollection>()
        .expect("collection cast")
        .set_attribute(shared.clone())
        .expect("Failed to set default");

    let light = registry.create::<Light>().expect("Failed to create Light");
    let mut collection = light.cast_mut::<AttributeCollection>().expect("collection cast");
    collection
        .share_attribute(shared.clone())
        .expect("Failed to share default");

    let mut editor = collection.edit::<ShadowAttribute>(&registry).expect("Failed to edit");
    assert!(!ElementPtr::ptr_eq(editor.element(), &shared));
    editor.get_mut().expect("editor deref").softness = 0.9;
    let local = editor.commit().expect("Failed to commit");

    assert_eq!(shared.cast::<ShadowAttribute>().expect("shared").softness, 0.5);
    assert_eq!(local.cast::<ShadowAttribute>().expect("local").softness, 0.9);
    let held = collection.get_attribute::<ShadowAttribute>().expect("local attribute");
    assert!(ElementPtr::ptr_eq(held, &local));
    assert_eq!(local.cast::<Attribute>().expect("attribute").collection(), Some(collection.id()));
}

#[test]
fn test_viewer_errors_are_distinct() {
    let registry = registry();
    let light = registry.create::<Light>().expect("Failed to create Light");

    {
        let collection = light.cast::<AttributeCollection>().expect("collection cast");
        let viewer = collection
            .view::<ShadowAttribute>(&registry, false)
            .expect("Failed to view");
        assert!(!viewer.is_valid());
        assert!(matches!(viewer.get(), Err(Error::MissingAttribute(_))));

        let fallback = collection
            .view::<ShadowAttribute>(&registry, true)
            .expect("Failed to view");
        assert_eq!(fallback.get().expect("default attribute").bias, 0.0);
        assert!(collection.attributes().is_empty(), "viewers never mutate");
    }

    let mut collection = light.cast_mut::<AttributeCollection>().expect("collection cast");
    let mut editor = collection.edit::<ShadowAttribute>(&registry).expect("Failed to edit");
    editor.get_mut().expect("editor deref").bias = 0.2;
    editor.commit().expect("Failed to commit");

    collection
        .get_attribute::<ShadowAttribute>()
        .expect("attribute")
        .cast_mut::<Attribute>()
        .expect("attribute cast")
        .set_enabled(false);

    let viewer = collection
        .view::<ShadowAttribute>(&registry, false)
        .expect("Failed to view");
    assert!(viewer.is_valid());
    assert!(!viewer.is_enabled());
    assert!(matches!(viewer.get(), Err(Error::DisabledAttribute(_))));
}

#[test]
fn test_scene_types_are_not_attributes() {
    let registry = registry();
    let light = registry.create::<Light>().expect("Failed to create Light");
    let other = registry.create::<Transform>().expect("Failed to create Transform");
    other
        .cast_mut::<Transform>()
        .expect("Transform cast")
        .translate = Vec3::X;

    let result = light
        .cast_mut::<AttributeCollection>()
        .expect("collection cast")
        .set_attribute(other);
    assert!(matches!(result, Err(Error::InvalidAttribute(_))));
}
