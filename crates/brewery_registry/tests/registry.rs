//! Resolution behavior of `brewery_registry` across lifetimes.

use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use brewery_registry::{Lifetime, Registration, Registry, RegistryBuilder, RegistryError};

#[derive(Debug)]
struct Logger {
    lines: Mutex<Vec<String>>,
}

struct Repository {
    logger: Arc<Logger>,
}

struct RequestState {
    scope_id: u64,
}

fn counting<T: Send + Sync + 'static>(
    calls: &Arc<AtomicUsize>,
    make: fn() -> T,
) -> impl Fn(&brewery_registry::Injector<'_>) -> Result<T, brewery_registry::BoxError> + Send + Sync + 'static
{
    let calls = Arc::clone(calls);
    move |_| {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(make())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Singleton and value
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn singleton_resolves_to_the_same_instance() {
    let calls = Arc::new(AtomicUsize::new(0));
    let registry = RegistryBuilder::new()
        .with(
            "logger",
            Registration::singleton(Vec::<String>::new(), counting(&calls, || Logger {
                lines: Mutex::new(Vec::new()),
            })),
        )
        .build();

    let first = registry.resolve_as::<Logger>("logger").unwrap();
    let second = registry.resolve_as::<Logger>("logger").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn value_is_shared_without_copy() {
    let original = Arc::new(Logger {
        lines: Mutex::new(Vec::new()),
    });
    let registry = RegistryBuilder::new()
        .with("logger", Registration::shared(Arc::clone(&original)))
        .build();

    let resolved = registry.resolve_as::<Logger>("logger").unwrap();
    resolved.lines.lock().unwrap().push("hello".into());

    assert!(Arc::ptr_eq(&original, &resolved));
    assert_eq!(original.lines.lock().unwrap().as_slice(), ["hello"]);
    assert_eq!(registry.lifetime("logger"), Some(Lifetime::Value));
}

#[test]
fn singleton_dependencies_are_resolved_by_key() {
    let registry = RegistryBuilder::new()
        .with(
            "logger",
            Registration::value(Logger {
                lines: Mutex::new(Vec::new()),
            }),
        )
        .with(
            "repository",
            Registration::singleton(["logger"], |inj| {
                Ok(Repository {
                    logger: inj.get::<Logger>("logger")?,
                })
            }),
        )
        .build();

    let repository = registry.resolve_as::<Repository>("repository").unwrap();
    let logger = registry.resolve_as::<Logger>("logger").unwrap();
    assert!(Arc::ptr_eq(&repository.logger, &logger));
}

// ─────────────────────────────────────────────────────────────────────────────
// Scopes
// ─────────────────────────────────────────────────────────────────────────────

fn scoped_registry() -> Registry {
    RegistryBuilder::new()
        .with(
            "req",
            Registration::scoped(Vec::<String>::new(), |inj| {
                Ok(RequestState {
                    scope_id: inj.scope().map_or(0, brewery_registry::Scope::id),
                })
            }),
        )
        .build()
}

#[test]
fn scoped_instances_are_distinct_across_scopes() {
    let registry = scoped_registry();
    let a = registry.create_scope();
    let b = registry.create_scope();

    let from_a = a.resolve_as::<RequestState>("req").unwrap();
    let from_b = b.resolve_as::<RequestState>("req").unwrap();

    assert!(!Arc::ptr_eq(&from_a, &from_b));
    assert_eq!(from_a.scope_id, a.id());
    assert_eq!(from_b.scope_id, b.id());
}

#[test]
fn scoped_instance_is_cached_within_a_scope() {
    let registry = scoped_registry();
    let scope = registry.create_scope();

    let first = scope.resolve_as::<RequestState>("req").unwrap();
    let second = scope.resolve_as::<RequestState>("req").unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(scope.cached(), 1);
}

#[test]
fn scoped_key_requires_a_scope() {
    let registry = scoped_registry();
    let err = registry.resolve("req").unwrap_err();
    assert!(matches!(err, RegistryError::ScopeRequired { ref key } if key == "req"));
}

#[test]
fn singleton_cannot_capture_a_scoped_dependency() {
    let registry = RegistryBuilder::new()
        .with(
            "req",
            Registration::scoped(Vec::<String>::new(), |_| Ok(RequestState { scope_id: 0 })),
        )
        .with("service", Registration::singleton(["req"], |_| Ok(())))
        .build();

    let scope = registry.create_scope();
    let err = scope.resolve("service").unwrap_err();
    assert!(matches!(err, RegistryError::ScopeRequired { ref key } if key == "req"));
}

#[test]
fn transient_sees_scoped_dependencies() {
    let registry = RegistryBuilder::new()
        .with(
            "req",
            Registration::scoped(Vec::<String>::new(), |inj| {
                Ok(RequestState {
                    scope_id: inj.scope().map_or(0, brewery_registry::Scope::id),
                })
            }),
        )
        .with(
            "useCase",
            Registration::transient(["req"], |inj| inj.get::<RequestState>("req").map_err(Into::into)),
        )
        .build();

    let scope = registry.create_scope();
    let use_case = scope.resolve_as::<Arc<RequestState>>("useCase").unwrap();
    let req = scope.resolve_as::<RequestState>("req").unwrap();
    assert!(Arc::ptr_eq(&*use_case, &req));
}

// ─────────────────────────────────────────────────────────────────────────────
// Failures
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn unknown_key_is_unresolved() {
    let registry = RegistryBuilder::new().build();
    let err = registry.resolve("ghost").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Unresolved { ref key, requested_by: None } if key == "ghost"
    ));
    assert!(err.to_string().contains("ghost"));
}

#[test]
fn missing_dependency_names_the_requester() {
    let registry = RegistryBuilder::new()
        .with("service", Registration::singleton(["ghost"], |_| Ok(())))
        .build();

    let err = registry.resolve("service").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::Unresolved { ref key, ref requested_by }
            if key == "ghost" && requested_by.as_deref() == Some("service")
    ));
}

#[test]
fn cycle_fails_instead_of_recursing() {
    let registry = RegistryBuilder::new()
        .with("a", Registration::singleton(["b"], |_| Ok(())))
        .with("b", Registration::singleton(["a"], |_| Ok(())))
        .build();

    let err = registry.resolve("a").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::CyclicDependency { ref path } if path == &["a", "b", "a"]
    ));
}

#[test]
fn undeclared_lazy_cycle_is_detected() {
    let registry = RegistryBuilder::new()
        .with(
            "a",
            Registration::singleton(Vec::<String>::new(), |inj| {
                inj.instance("a")?;
                Ok(())
            }),
        )
        .build();

    let err = registry.resolve("a").unwrap_err();
    assert!(matches!(
        err,
        RegistryError::CyclicDependency { ref path } if path == &["a", "a"]
    ));
}

#[test]
fn constructor_failure_is_wrapped_and_retried() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let registry = RegistryBuilder::new()
        .with(
            "flaky",
            Registration::singleton(Vec::<String>::new(), move |_| {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err("first attempt fails".into())
                } else {
                    Ok(7_u8)
                }
            }),
        )
        .build();

    let err = registry.resolve("flaky").unwrap_err();
    assert!(matches!(err, RegistryError::Construction { ref key, .. } if key == "flaky"));

    assert_eq!(*registry.resolve_as::<u8>("flaky").unwrap(), 7);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn router_style_singleton_can_hold_a_weak_handle() {
    let registry = RegistryBuilder::new()
        .with("config", Registration::value(String::from("prod")))
        .with(
            "router",
            Registration::singleton(Vec::<String>::new(), |inj| Ok(inj.handle())),
        )
        .build();

    let handle = registry
        .resolve_as::<brewery_registry::RegistryHandle>("router")
        .unwrap();
    let config = handle
        .upgrade()
        .unwrap()
        .resolve_as::<String>("config")
        .unwrap();
    assert_eq!(config.as_str(), "prod");
}
