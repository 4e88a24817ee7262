//! Integration tests for writing archives and verifying round-trip.

mod common;

use common::{init_tracing, registry, spot_light, Light, LightType, SceneNode, ShadowAttribute, Transform};
use glam::{Quat, Vec3};
use reflect::archive::inspect;
use reflect::attribute::AttributeCollection;
use reflect::prelude::*;
use tempfile::{tempdir, NamedTempFile};

const ALL_OPTIONS: [(ByteOrder, CharacterEncoding); 4] = [
    (ByteOrder::LittleEndian, CharacterEncoding::Ascii),
    (ByteOrder::LittleEndian, CharacterEncoding::Utf16),
    (ByteOrder::BigEndian, CharacterEncoding::Ascii),
    (ByteOrder::BigEndian, CharacterEncoding::Utf16),
];

#[test]
fn test_roundtrip_all_byte_orders_and_encodings() {
    init_tracing();
    let registry = registry();

    for (byte_order, encoding) in ALL_OPTIONS {
        let light = spot_light(&registry);
        let temp = NamedTempFile::new().expect("Failed to create temp file");
        let options = ArchiveOptions::default()
            .with_byte_order(byte_order)
            .with_encoding(encoding);

        Archive::to_file(&registry, &[light.clone()], temp.path(), options).expect("Failed to write archive");
        let loaded = Archive::read_file(&registry, temp.path()).expect("Failed to read archive");

        assert_eq!(loaded.len(), 1, "{byte_order} {encoding}");
        assert_eq!(loaded[0].uid(), light.uid());
        assert!(
            loaded[0].field_equals(&light),
            "round-trip differs for {byte_order} {encoding}"
        );

        let l = loaded[0].cast::<Light>().expect("Light cast");
        assert_eq!(l.transform.node.name, "key");
        assert_eq!(l.light_type, LightType::Spot);
        assert_eq!(l.transform.rotate, Quat::from_rotation_y(0.5));
    }
}

#[test]
fn test_roundtrip_compressed_in_memory() {
    let registry = registry();
    let lights: Vec<_> = (0..8).map(|_| spot_light(&registry)).collect();

    let options = ArchiveOptions::default().with_compression(true);
    let bytes = Archive::to_bytes(&registry, &lights, options).expect("Failed to write archive");
    let loaded = Archive::from_bytes(&registry, &bytes).expect("Failed to read archive");

    assert_eq!(loaded.len(), lights.len());
    for (a, b) in lights.iter().zip(&loaded) {
        assert!(a.field_equals(b));
    }
}

/// A light written in one byte order and read back on a host of the other.
#[test]
fn test_light_survives_byte_order_flip() {
    let registry = registry();
    let light = registry.create::<Light>().expect("Failed to create Light");
    {
        let mut l = light.cast_mut::<Light>().expect("Light cast");
        l.color = Vec3::new(1.0, 1.0, 1.0);
        l.cast_shadows = true;
    }

    let options = ArchiveOptions::default()
        .with_byte_order(ByteOrder::native().swapped())
        .with_encoding(CharacterEncoding::Ascii);
    let bytes = Archive::to_bytes(&registry, &[light], options).expect("Failed to write archive");
    // The colour equals its default but is forced into the archive.
    assert!(bytes.windows(7).any(|w| w == b"m_Color"), "forced field not written");
    assert!(!bytes.windows(11).any(|w| w == b"m_Intensity"), "default field written");

    let loaded = Archive::from_bytes(&registry, &bytes).expect("Failed to read archive");
    let l = loaded[0].cast::<Light>().expect("Light cast");
    assert!(l.cast_shadows);
    assert_eq!(l.color, Vec3::new(1.0, 1.0, 1.0));
    drop(l);
    assert_eq!(
        loaded[0].get_field("m_Color").expect("Failed to get field"),
        Value::Vec3(Vec3::ONE)
    );
    assert_eq!(
        loaded[0].get_field("m_CastShadows").expect("Failed to get field"),
        Value::Bool(true)
    );
}

/// A transform type whose instances start with a name.
struct Camera {
    transform: Transform,
    focal_length: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            transform: Transform {
                node: SceneNode {
                    name: "camera".into(),
                    ..Default::default()
                },
                ..Default::default()
            },
            focal_length: 35.0,
        }
    }
}

impl Reflect for Camera {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_field("m_FocalLength", |c| &c.focal_length, |c| &mut c.focal_length);
    }

    fn base() -> Option<BaseLink<Self>> {
        Some(BaseLink::new(|c: &Camera| &c.transform, |c: &mut Camera| &mut c.transform))
    }
}

#[test]
fn test_derived_defaults_override_base() {
    let mut registry = registry();
    registry.register_class::<Camera>("Camera").expect("Failed to register Camera");

    // Cleared back to the base type's default, which differs from Camera's.
    let unnamed = registry.create::<Camera>().expect("Failed to create Camera");
    unnamed.cast_mut::<SceneNode>().expect("SceneNode cast").name.clear();
    let named = registry.create::<Camera>().expect("Failed to create Camera");

    let bytes = Archive::to_bytes(&registry, &[unnamed.clone(), named.clone()], ArchiveOptions::default())
        .expect("Failed to write archive");
    let loaded = Archive::from_bytes(&registry, &bytes).expect("Failed to read archive");

    assert_eq!(loaded[0].cast::<SceneNode>().expect("SceneNode cast").name, "");
    assert_eq!(loaded[1].cast::<SceneNode>().expect("SceneNode cast").name, "camera");
    assert!(loaded[0].field_equals(&unnamed));
    assert!(loaded[1].field_equals(&named));

    let class = registry.get_class("Camera").expect("Camera not registered");
    let name = class.find_field("m_Name").expect("m_Name not inherited");
    assert_eq!(class.default_of(name), Some(&Value::String("camera".into())));
}

#[test]
fn test_attributes_roundtrip() {
    let registry = registry();
    let light = spot_light(&registry);

    let bytes = Archive::to_bytes(&registry, &[light], ArchiveOptions::default()).expect("Failed to write archive");
    let loaded = Archive::from_bytes(&registry, &bytes).expect("Failed to read archive");

    let collection = loaded[0].cast::<AttributeCollection>().expect("collection cast");
    let shadow = collection
        .get_attribute::<ShadowAttribute>()
        .expect("shadow attribute missing");
    let owner = shadow.cast::<Attribute>().expect("attribute cast").collection();
    assert_eq!(owner, Some(collection.id()), "post-load must reclaim attributes");

    let s = shadow.cast::<ShadowAttribute>().expect("shadow cast");
    assert_eq!(s.softness, 0.25);
    assert_eq!(s.bias, 0.01);
}

#[test]
fn test_references_resolve_after_load() {
    let registry = registry();
    let target = registry
        .wrap(Transform {
            translate: Vec3::new(0.0, 0.0, -5.0),
            ..Default::default()
        })
        .expect("Failed to create Transform");
    let light = registry.create::<Light>().expect("Failed to create Light");
    light.cast_mut::<Light>().expect("Light cast").target = target.uid();

    let bytes = Archive::to_bytes(&registry, &[light, target.clone()], ArchiveOptions::default())
        .expect("Failed to write archive");
    let loaded = Archive::from_bytes(&registry, &bytes).expect("Failed to read archive");

    assert_eq!(loaded.len(), 2);
    let l = loaded[0].cast::<Light>().expect("Light cast");
    let resolved = l.resolved_target.as_ref().expect("target not resolved");
    assert_eq!(resolved.uid(), target.uid());
    assert!(ElementPtr::ptr_eq(resolved, &loaded[1]));
}

#[test]
fn test_shared_elements_load_once() {
    let registry = registry();
    let shadow = registry.create::<ShadowAttribute>().expect("Failed to create ShadowAttribute");
    shadow.cast_mut::<ShadowAttribute>().expect("shadow cast").bias = 0.5;

    let lights: Vec<_> = (0..2)
        .map(|_| {
            let light = registry.create::<Light>().expect("Failed to create Light");
            light
                .cast_mut::<AttributeCollection>()
                .expect("collection cast")
                .share_attribute(shadow.clone())
                .expect("Failed to share attribute");
            light
        })
        .collect();

    let bytes = Archive::to_bytes(&registry, &lights, ArchiveOptions::default()).expect("Failed to write archive");
    let loaded = Archive::from_bytes(&registry, &bytes).expect("Failed to read archive");

    let first = loaded[0].children();
    let second = loaded[1].children();
    assert_eq!(first.len(), 1);
    assert!(ElementPtr::ptr_eq(&first[0], &second[0]));
}

#[test]
fn test_status_progress() {
    let registry = registry();
    let lights: Vec<_> = (0..4).map(|_| spot_light(&registry)).collect();

    let mut progress = Vec::new();
    let mut archive = Archive::new(&registry, ArchiveOptions::default()).with_status(|status| {
        if let ArchiveStatus::ElementProcessed { progress: p } = status {
            progress.push(*p);
        }
    });
    archive.write_to_bytes(&lights).expect("Failed to write archive");
    drop(archive);

    assert_eq!(progress, vec![0.25, 0.5, 0.75, 1.0]);
}

#[test]
fn test_from_file_finds_first_of_type() {
    let registry = registry();
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scene.rb");

    let transform = registry.create::<Transform>().expect("Failed to create Transform");
    let light = spot_light(&registry);
    Archive::to_file(&registry, &[transform, light.clone()], &path, ArchiveOptions::default())
        .expect("Failed to write archive");

    let found = Archive::from_file::<Light>(&registry, &path).expect("Failed to load Light");
    assert_eq!(found.uid(), light.uid());

    // Lights are transforms too.
    let first = Archive::from_file::<Transform>(&registry, &path).expect("Failed to load Transform");
    assert_eq!(first.type_name(), "Transform");

    let missing = Archive::from_file::<ShadowAttribute>(&registry, &path);
    assert!(matches!(missing, Err(Error::ElementNotFound { .. })));
}

#[test]
fn test_missing_file_is_stream_error() {
    let registry = registry();
    let dir = tempdir().expect("Failed to create temp dir");
    let result = Archive::read_file(&registry, dir.path().join("absent.rb"));
    match result {
        Err(Error::StreamIo { context, .. }) => assert!(context.contains("absent.rb")),
        other => panic!("expected StreamIo, got {other:?}"),
    }
}

#[test]
fn test_truncated_archive_fails() {
    let registry = registry();
    let bytes = Archive::to_bytes(&registry, &[spot_light(&registry)], ArchiveOptions::default())
        .expect("Failed to write archive");
    let truncated = &bytes[..bytes.len() / 2];
    assert!(Archive::from_bytes(&registry, truncated).is_err());
}

#[test]
fn test_json_dump_loads_back() {
    let registry = registry();
    let light = spot_light(&registry);
    light.cast_mut::<Light>().expect("Light cast").intensity = 6.0;

    let text = inspect::to_json_string(&[light.clone()]).expect("Failed to dump");
    let loaded = inspect::from_json_str(&registry, &text).expect("Failed to load dump");

    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].uid(), light.uid());
    assert!(loaded[0].field_equals(&light), "JSON round-trip differs");

    let collection = loaded[0].cast::<AttributeCollection>().expect("collection cast");
    let shadow = collection
        .get_attribute::<ShadowAttribute>()
        .expect("shadow attribute missing");
    let owner = shadow.cast::<Attribute>().expect("attribute cast").collection();
    assert_eq!(owner, Some(collection.id()), "post-load must reclaim attributes");
}
