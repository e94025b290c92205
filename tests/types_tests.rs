//! Integration tests for the host-populated type space.
//!
//! Covers namespace definition and resolution, member dispatch, visibility,
//! inheritance/inclusion lookup, and definition-event publication.

use std::sync::{Arc, Mutex};

use calltally::{
    Call, CallError, DefinitionEvent, MethodFn, TypeError, TypeSpace, Visibility, unit,
};

fn noop() -> MethodFn {
    Arc::new(|_: Call<'_>| Ok(unit()))
}

// =============================================================================
// Definition and Resolution
// =============================================================================

#[test]
fn test_define_and_resolve_nested() {
    let space = TypeSpace::new();
    let workshop = space.define_type("Workshop", None).unwrap();
    let lathe = space.define_type("Workshop::Lathe", None).unwrap();

    assert_eq!(space.resolve("Workshop"), Some(workshop));
    assert_eq!(space.resolve("Workshop::Lathe"), Some(lathe));
    assert_eq!(space.type_path(lathe), "Workshop::Lathe");
}

#[test]
fn test_resolve_discards_leading_root_segment() {
    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    assert_eq!(space.resolve("::Oven"), Some(oven));
}

#[test]
fn test_resolve_miss_is_none_not_error() {
    let space = TypeSpace::new();
    space.define_type("Oven", None).unwrap();

    assert_eq!(space.resolve("Toaster"), None);
    assert_eq!(space.resolve("Oven::Rack"), None);
    assert_eq!(space.resolve(""), None);
}

#[test]
fn test_reopen_returns_existing_id() {
    let space = TypeSpace::new();
    let first = space.define_type("Oven", None).unwrap();
    let second = space.define_type("Oven", None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_reopen_with_conflicting_superclass() {
    let space = TypeSpace::new();
    space.define_type("Appliance", None).unwrap();
    space.define_type("Fixture", None).unwrap();
    space.define_type("Oven", Some("Appliance")).unwrap();

    let again = space.define_type("Oven", Some("Appliance")).unwrap();
    assert_eq!(space.resolve("Oven"), Some(again));

    let result = space.define_type("Oven", Some("Fixture"));
    assert!(matches!(result, Err(TypeError::SuperclassMismatch(_))));
}

#[test]
fn test_define_under_missing_parent() {
    let space = TypeSpace::new();
    let result = space.define_type("Missing::Child", None);
    assert!(matches!(result, Err(TypeError::ParentNotFound(_))));
}

#[test]
fn test_define_malformed_path() {
    let space = TypeSpace::new();
    assert!(matches!(
        space.define_type("", None),
        Err(TypeError::InvalidPath(_))
    ));
    assert!(matches!(
        space.define_type("Oven::", None),
        Err(TypeError::InvalidPath(_))
    ));
}

#[test]
fn test_define_with_unknown_superclass() {
    let space = TypeSpace::new();
    let result = space.define_type("Oven", Some("Appliance"));
    assert!(matches!(result, Err(TypeError::SuperclassNotFound(_))));
}

// =============================================================================
// Dispatch
// =============================================================================

#[test]
fn test_call_passes_args_and_returns_value() {
    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    space.define_instance_method(
        oven,
        "double",
        Visibility::Public,
        Arc::new(|call: Call<'_>| {
            let n = *call.args[0].downcast_ref::<i64>().unwrap();
            Ok(Box::new(n * 2))
        }),
    );

    let inst = space.new_instance("Oven").unwrap();
    let out = space
        .call_instance(&inst, "double", vec![Box::new(21i64)], None)
        .unwrap();
    assert_eq!(*out.downcast::<i64>().unwrap(), 42);
}

#[test]
fn test_call_missing_method() {
    let space = TypeSpace::new();
    space.define_type("Oven", None).unwrap();
    let inst = space.new_instance("Oven").unwrap();

    let result = space.call_instance(&inst, "bake", Vec::new(), None);
    assert!(matches!(result, Err(CallError::MethodMissing { .. })));
}

#[test]
fn test_call_static_unknown_type() {
    let space = TypeSpace::new();
    let result = space.call_static("Toaster", "pop", Vec::new(), None);
    assert!(matches!(result, Err(CallError::TypeNotFound(_))));
}

#[test]
fn test_new_instance_unknown_type() {
    let space = TypeSpace::new();
    assert!(matches!(
        space.new_instance("Toaster"),
        Err(TypeError::TypeNotFound(_))
    ));
}

#[test]
fn test_host_error_passes_through() {
    #[derive(Debug)]
    struct Burnt;
    impl std::fmt::Display for Burnt {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("burnt")
        }
    }
    impl std::error::Error for Burnt {}

    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    space.define_instance_method(
        oven,
        "bake",
        Visibility::Public,
        Arc::new(|_: Call<'_>| Err(CallError::Host(Box::new(Burnt)))),
    );

    let inst = space.new_instance("Oven").unwrap();
    let err = space
        .call_instance(&inst, "bake", Vec::new(), None)
        .unwrap_err();
    assert!(matches!(err, CallError::Host(_)));
    assert_eq!(err.to_string(), "burnt");
}

#[test]
fn test_block_passes_through() {
    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    space.define_instance_method(
        oven,
        "with_timer",
        Visibility::Public,
        Arc::new(|mut call: Call<'_>| {
            let arg = call.args.remove(0);
            let mut block = call.block.take().expect("caller attaches a block");
            block(vec![arg])
        }),
    );

    let seen = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&seen);
    let inst = space.new_instance("Oven").unwrap();
    space
        .call_instance(
            &inst,
            "with_timer",
            vec![Box::new(42i64)],
            Some(Box::new(move |mut args| {
                *sink.lock().unwrap() = Some(*args.remove(0).downcast::<i64>().unwrap());
                Ok(unit())
            })),
        )
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), Some(42));
}

// =============================================================================
// Visibility
// =============================================================================

#[test]
fn test_non_public_members_require_send() {
    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    space.define_instance_method(oven, "ignite", Visibility::Private, noop());
    space.define_instance_method(oven, "vent", Visibility::Protected, noop());

    let inst = space.new_instance("Oven").unwrap();
    assert!(matches!(
        space.call_instance(&inst, "ignite", Vec::new(), None),
        Err(CallError::PrivateMethod { .. })
    ));
    assert!(matches!(
        space.call_instance(&inst, "vent", Vec::new(), None),
        Err(CallError::PrivateMethod { .. })
    ));
    assert!(space.send_instance(&inst, "ignite", Vec::new(), None).is_ok());
    assert!(space.send_instance(&inst, "vent", Vec::new(), None).is_ok());
}

// =============================================================================
// Inheritance and Inclusion
// =============================================================================

#[test]
fn test_instance_members_inherit_through_superclass() {
    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    space.define_type("Toaster", Some("Oven")).unwrap();
    space.define_instance_method(oven, "bake", Visibility::Public, noop());

    let inst = space.new_instance("Toaster").unwrap();
    assert!(space.call_instance(&inst, "bake", Vec::new(), None).is_ok());
}

#[test]
fn test_static_members_inherit_through_superclass() {
    let space = TypeSpace::new();
    let oven = space.define_type("Oven", None).unwrap();
    space.define_type("Toaster", Some("Oven")).unwrap();
    space.define_static_method(oven, "preheat", Visibility::Public, noop());

    assert!(space.call_static("Toaster", "preheat", Vec::new(), None).is_ok());
}

#[test]
fn test_included_module_members_are_callable() {
    let space = TypeSpace::new();
    let seasoning = space.define_type("Seasoning", None).unwrap();
    let dish = space.define_type("Dish", None).unwrap();
    space.define_instance_method(seasoning, "sprinkle", Visibility::Public, noop());
    space.include_module(dish, seasoning);

    let inst = space.new_instance("Dish").unwrap();
    assert!(space.call_instance(&inst, "sprinkle", Vec::new(), None).is_ok());
}

#[test]
fn test_later_include_wins() {
    let space = TypeSpace::new();
    let mild = space.define_type("Mild", None).unwrap();
    let spicy = space.define_type("Spicy", None).unwrap();
    let dish = space.define_type("Dish", None).unwrap();
    space.define_instance_method(
        mild,
        "flavor",
        Visibility::Public,
        Arc::new(|_: Call<'_>| Ok(Box::new(1i64))),
    );
    space.define_instance_method(
        spicy,
        "flavor",
        Visibility::Public,
        Arc::new(|_: Call<'_>| Ok(Box::new(2i64))),
    );
    space.include_module(dish, mild);
    space.include_module(dish, spicy);

    let inst = space.new_instance("Dish").unwrap();
    let out = space
        .call_instance(&inst, "flavor", Vec::new(), None)
        .unwrap();
    assert_eq!(*out.downcast::<i64>().unwrap(), 2);
}

#[test]
fn test_own_definition_beats_included_module() {
    let space = TypeSpace::new();
    let mild = space.define_type("Mild", None).unwrap();
    let dish = space.define_type("Dish", None).unwrap();
    space.define_instance_method(
        mild,
        "flavor",
        Visibility::Public,
        Arc::new(|_: Call<'_>| Ok(Box::new(1i64))),
    );
    space.define_instance_method(
        dish,
        "flavor",
        Visibility::Public,
        Arc::new(|_: Call<'_>| Ok(Box::new(3i64))),
    );
    space.include_module(dish, mild);

    let inst = space.new_instance("Dish").unwrap();
    let out = space
        .call_instance(&inst, "flavor", Vec::new(), None)
        .unwrap();
    assert_eq!(*out.downcast::<i64>().unwrap(), 3);
}

// =============================================================================
// Definition Events
// =============================================================================

#[test]
fn test_definitions_publish_events() {
    let space = TypeSpace::new();
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    space.subscribe(Arc::new(move |event| {
        sink.lock().unwrap().push(event.clone());
    }));

    let seasoning = space.define_type("Seasoning", None).unwrap();
    let dish = space.define_type("Dish", None).unwrap();
    space.define_instance_method(seasoning, "sprinkle", Visibility::Public, noop());
    space.define_static_method(dish, "plate", Visibility::Public, noop());
    space.include_module(dish, seasoning);

    let events = events.lock().unwrap();
    assert_eq!(
        *events,
        vec![
            DefinitionEvent::InstanceMethodAdded {
                type_path: "Seasoning".to_string(),
                method: "sprinkle".to_string(),
            },
            DefinitionEvent::StaticMethodAdded {
                type_path: "Dish".to_string(),
                method: "plate".to_string(),
            },
            DefinitionEvent::ModuleIncluded {
                host: "Dish".to_string(),
                module: "Seasoning".to_string(),
            },
        ]
    );
}
