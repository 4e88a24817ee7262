//! Scene fixtures shared by the integration tests.
//!
//! `Light -> Transform -> SceneNode -> AttributeCollection`, plus a shadow
//! attribute and a light type enumeration.

#![allow(dead_code)]

use glam::{Quat, Vec3};
use reflect::attribute::{self, Attribute, AttributeCollection};
use reflect::prelude::*;

/// Install a test subscriber honouring `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// === Enumerations ===

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LightType {
    #[default]
    Point,
    Spot,
    Directional,
}

impl ReflectEnum for LightType {
    fn enumerate(e: &mut Enumeration) {
        e.add_element(0, "Point")
            .add_element(1, "Spot")
            .add_element(2, "Directional");
    }

    fn enumeration_name() -> &'static str {
        "LightType"
    }

    fn to_i32(self) -> i32 {
        self as i32
    }

    fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::Point),
            1 => Some(Self::Spot),
            2 => Some(Self::Directional),
            _ => None,
        }
    }
}

// === Scene types ===

/// Abstract base of everything in a scene.
#[derive(Default)]
pub struct SceneNode {
    pub attributes: AttributeCollection,
    pub name: String,
    pub hidden: bool,
}

impl Reflect for SceneNode {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_field("m_Name", |n| &n.name, |n| &mut n.name);
        comp.add_field("m_Hidden", |n| &n.hidden, |n| &mut n.hidden);
    }

    fn base() -> Option<BaseLink<Self>> {
        Some(BaseLink::new(
            |n: &SceneNode| &n.attributes,
            |n: &mut SceneNode| &mut n.attributes,
        ))
    }

    // Older files stored visibility instead of hidden-ness.
    fn process_component(&mut self, field: &str, value: &Value) -> bool {
        match (field, value.as_bool()) {
            ("m_Visible", Some(visible)) => {
                self.hidden = !visible;
                true
            }
            _ => false,
        }
    }
}

pub struct Transform {
    pub node: SceneNode,
    pub translate: Vec3,
    pub rotate: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            node: SceneNode::default(),
            translate: Vec3::ZERO,
            rotate: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Reflect for Transform {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_field("m_Translate", |t| &t.translate, |t| &mut t.translate);
        comp.add_field("m_Rotate", |t| &t.rotate, |t| &mut t.rotate);
        comp.add_field("m_Scale", |t| &t.scale, |t| &mut t.scale);
    }

    fn base() -> Option<BaseLink<Self>> {
        Some(BaseLink::new(|t: &Transform| &t.node, |t: &mut Transform| &mut t.node))
    }
}

pub struct Light {
    pub transform: Transform,
    pub color: Vec3,
    pub intensity: f32,
    pub light_type: LightType,
    pub cast_shadows: bool,
    /// Uid of the transform the light aims at
    pub target: Uid,
    /// Resolved after load; not persisted
    pub resolved_target: Option<ElementPtr>,
    legacy_target_name: Option<String>,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            transform: Transform::default(),
            color: Vec3::ONE,
            intensity: 1.0,
            light_type: LightType::Point,
            cast_shadows: false,
            target: Uid::NULL,
            resolved_target: None,
            legacy_target_name: None,
        }
    }
}

impl Reflect for Light {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_field("m_Color", |l| &l.color, |l| &mut l.color)
            .flags(FieldFlags::FORCE);
        comp.add_field("m_Intensity", |l| &l.intensity, |l| &mut l.intensity);
        comp.add_enumeration_field("m_LightType", |l| &l.light_type, |l| &mut l.light_type);
        comp.add_field("m_CastShadows", |l| &l.cast_shadows, |l| &mut l.cast_shadows);
        comp.add_field("m_Target", |l| &l.target, |l| &mut l.target);
    }

    fn base() -> Option<BaseLink<Self>> {
        Some(BaseLink::new(|l: &Light| &l.transform, |l: &mut Light| &mut l.transform))
    }

    // Older files named the target instead of linking an element.
    fn process_component(&mut self, field: &str, value: &Value) -> bool {
        match (field, value.as_str()) {
            ("m_TargetName", Some(name)) => {
                self.legacy_target_name = Some(name.to_owned());
                true
            }
            _ => false,
        }
    }

    fn post_load(&mut self, ctx: &mut PostLoadContext<'_>) -> Result<()> {
        if let Some(name) = self.legacy_target_name.take() {
            let target = ctx.registry().wrap(Transform {
                node: SceneNode {
                    name,
                    ..Default::default()
                },
                ..Default::default()
            })?;
            self.target = target.uid();
            self.resolved_target = Some(target.clone());
            ctx.add_element(target);
        } else {
            self.resolved_target = ctx.resolve(self.target);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct ShadowAttribute {
    pub attribute: Attribute,
    pub softness: f32,
    pub bias: f32,
}

impl Reflect for ShadowAttribute {
    fn enumerate_class(comp: &mut Compositor<Self>) {
        comp.add_field("m_Softness", |s| &s.softness, |s| &mut s.softness);
        comp.add_field("m_Bias", |s| &s.bias, |s| &mut s.bias);
    }

    fn base() -> Option<BaseLink<Self>> {
        Some(BaseLink::new(
            |s: &ShadowAttribute| &s.attribute,
            |s: &mut ShadowAttribute| &mut s.attribute,
        ))
    }
}

/// Registry with every scene fixture type.
pub fn registry() -> Registry {
    let mut registry = Registry::new();
    attribute::register_types(&mut registry).expect("Failed to register attribute types");
    registry
        .register_abstract::<SceneNode>("SceneNode")
        .expect("Failed to register SceneNode");
    registry
        .register_class::<Transform>("Transform")
        .expect("Failed to register Transform");
    registry.register_class::<Light>("Light").expect("Failed to register Light");
    registry
        .register_class::<ShadowAttribute>("ShadowAttribute")
        .expect("Failed to register ShadowAttribute");
    registry
}

/// A spot light with a shadow attribute.
pub fn spot_light(registry: &Registry) -> ElementPtr {
    let light = registry.create::<Light>().expect("Failed to create Light");
    {
        let mut l = light.cast_mut::<Light>().expect("Light cast");
        l.transform.node.name = "key".into();
        l.transform.translate = Vec3::new(1.0, 4.0, -2.0);
        l.transform.rotate = Quat::from_rotation_y(0.5);
        l.color = Vec3::new(1.0, 0.9, 0.7);
        l.intensity = 3.5;
        l.light_type = LightType::Spot;
        l.cast_shadows = true;
    }
    let shadow = registry
        .wrap(ShadowAttribute {
            softness: 0.25,
            bias: 0.01,
            ..Default::default()
        })
        .expect("Failed to create ShadowAttribute");
    light
        .cast_mut::<AttributeCollection>()
        .expect("collection cast")
        .set_attribute(shadow)
        .expect("Failed to attach shadow");
    light
}
