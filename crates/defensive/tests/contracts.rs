//! Integration tests for contract invocation
//!
//! Covers:
//! - Signature checking and argument validation
//! - Enter, exit and error lines with redaction
//! - Causal chains across nested contracts, sync and async

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use defensive::{
    initialize, ConfigOverrides, Contract, ContractConfig, ContractOptions, Defensive, Fault,
    LogLevel, MemoryLoggerFactory, Schema, SchemaMap,
};
use serde_json::{json, Value};

fn runtime() -> (Defensive<()>, MemoryLoggerFactory) {
    let logs = MemoryLoggerFactory::new();
    let config = ContractConfig::builder()
        .loggers(Arc::new(logs.clone()))
        .build();
    (initialize(config), logs)
}

fn add_ten(args: Vec<Value>) -> Result<Value, Fault> {
    let a = args[0]
        .as_i64()
        .ok_or_else(|| Fault::msg("a is not an integer"))?;
    Ok(json!(a + 10))
}

#[test]
fn test_invalid_signature() {
    let (defensive, _) = runtime();
    let err = defensive
        .create_contract("foo")
        .options(ContractOptions {
            sync: true,
            ..Default::default()
        })
        .func(|_| Ok(json!(10)))
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "Invalid signature. Must be in format \"service-name#method-name\". Received \"foo\"."
    );
}

#[test]
fn test_validate_sync_function() {
    let (defensive, logs) = runtime();
    let func = defensive
        .create_contract("myService#fn")
        .params(["a"])
        .schema(SchemaMap::new().key("a", Schema::number().min(0)))
        .func(add_ten)
        .unwrap();

    assert_eq!(func.call(vec![json!(10)]).unwrap(), json!(20));

    let err = func.call(vec![json!(-10)]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Validation error: 'a' must be greater or equal to 0."
    );
    assert!(err.is_validation());

    let debug: Vec<(u64, String, String)> = logs
        .lines_at(LogLevel::Debug)
        .into_iter()
        .map(|l| (l.id, l.message, l.detail))
        .collect();
    assert_eq!(
        debug,
        vec![
            (1, "ENTER fn:".to_string(), "{ a: 10 }".to_string()),
            (1, " EXIT fn:".to_string(), "20".to_string()),
            (2, "ENTER fn:".to_string(), "{ a: -10 }".to_string()),
        ]
    );

    let errors = logs.lines_at(LogLevel::Error);
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id, 2);
    assert_eq!(errors[0].message, "ERROR fn: { a: -10 }");
    assert_eq!(
        errors[0].detail,
        "Validation error: 'a' must be greater or equal to 0."
    );
    assert_eq!(errors[0].service, "myService");
}

#[tokio::test]
async fn test_validate_async_function() {
    let (defensive, _) = runtime();
    let func = defensive
        .create_contract("myService#fn")
        .params(["a"])
        .schema(SchemaMap::new().key("a", Schema::number().min(0)))
        .async_func(|args| async move { add_ten(args) })
        .unwrap();

    assert_eq!(func.call(vec![json!(10)]).await.unwrap(), json!(20));
    let err = func.call(vec![json!(-10)]).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Validation error: 'a' must be greater or equal to 0."
    );
}

#[test]
fn test_nested_object_reports_first_declared_key() {
    let (defensive, _) = runtime();
    let func = defensive
        .create_contract("myService#fn")
        .params(["params"])
        .schema(SchemaMap::new().key(
            "params",
            Schema::object()
                .key("username", Schema::string().min(2))
                .key("inner", Schema::object().key("b", Schema::number().min(0))),
        ))
        .func(|args| {
            let params = &args[0];
            Ok(json!(format!(
                "{}-{}",
                params["username"].as_str().unwrap_or_default(),
                params["inner"]["b"]
            )))
        })
        .unwrap();

    let err = func
        .call(vec![json!({"username": "baz", "inner": {"b": -1}})])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Validation error: 'params.inner.b' must be greater or equal to 0."
    );

    let err = func
        .call(vec![json!({"username": "b", "inner": {"b": 10}})])
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "Validation error: 'params.username' length must be at least 2 characters long."
    );

    assert_eq!(
        func.call(vec![json!({"username": "bar", "inner": {"b": 10}})])
            .unwrap(),
        json!("bar-10")
    );
}

#[test]
fn test_implementation_not_invoked_on_validation_failure() {
    let (defensive, logs) = runtime();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let func = defensive
        .create_contract("myService#fn")
        .params(["a"])
        .schema(SchemaMap::new().key("a", Schema::number()))
        .func(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::Null)
        })
        .unwrap();

    assert!(func.call(vec![json!("not a number")]).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(logs
        .lines()
        .iter()
        .all(|line| !line.message.starts_with(" EXIT")));
}

#[test]
fn test_coerced_arguments_reach_implementation() {
    let (defensive, _) = runtime();
    let func = defensive
        .create_contract("myService#fn")
        .params(["a", "flag"])
        .schema(
            SchemaMap::new()
                .key("a", Schema::number())
                .key("flag", Schema::boolean()),
        )
        .func(|args| Ok(json!(args)))
        .unwrap();

    assert_eq!(
        func.call(vec![json!("5"), json!("true"), json!("extra")])
            .unwrap(),
        json!([5, true])
    );
}

#[test]
fn test_password_is_redacted_in_logs() {
    let (defensive, logs) = runtime();
    let login = defensive
        .create_contract("auth#login")
        .params(["credentials"])
        .func(|_| Ok(json!({"token": "abc", "ok": true})))
        .unwrap();

    login
        .call(vec![json!({"username": "john", "password": "secret"})])
        .unwrap();

    let lines = logs.lines();
    assert_eq!(
        lines[0].detail,
        "{ credentials: { username: 'john', password: '<removed>' } }"
    );
    assert_eq!(lines[1].detail, "{ token: '<removed>', ok: true }");
    assert!(lines.iter().all(|l| !l.detail.contains("secret")));
}

#[test]
fn test_remove_output() {
    let (defensive, logs) = runtime();
    let func = defensive
        .create_contract("myService#fn")
        .options(ContractOptions {
            sync: true,
            remove_output: true,
        })
        .params(["a"])
        .func(add_ten)
        .unwrap();

    assert_eq!(func.call(vec![json!(10)]).unwrap(), json!(20));
    let lines = logs.lines();
    assert_eq!(lines[1].message, " EXIT fn:");
    assert_eq!(lines[1].detail, "<removed>");
}

#[test]
fn test_debug_disabled_keeps_error_lines() {
    let (defensive, logs) = runtime();
    let func = defensive
        .create_contract("myService#fn")
        .config(ConfigOverrides::new().with_debug(false))
        .func(|_| Err(Fault::msg("some error")))
        .unwrap();

    assert!(func.call(vec![]).is_err());
    let lines = logs.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].level, LogLevel::Error);
    assert_eq!(lines[0].message, "ERROR fn: { }");
}

#[test]
fn test_sync_chain_collects_frames_innermost_first() {
    let (defensive, logs) = runtime();
    let c = defensive
        .create_contract("svc#c")
        .params(["n"])
        .func(|_| Err(Fault::msg("boom")))
        .unwrap();
    let b = {
        let c = c.clone();
        defensive
            .create_contract("svc#b")
            .params(["n"])
            .func(move |args| Ok(c.call(args)?))
            .unwrap()
    };
    let a = {
        let b = b.clone();
        defensive
            .create_contract("svc#a")
            .params(["n"])
            .func(move |args| Ok(b.call(args)?))
            .unwrap()
    };

    let err = a.call(vec![json!(1)]).unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(err.signatures(), vec!["svc#c", "svc#b", "svc#a"]);
    assert!(err.chain().iter().all(|frame| frame.input == "{ n: 1 }"));

    let errors: Vec<String> = logs
        .lines_at(LogLevel::Error)
        .into_iter()
        .map(|l| l.message)
        .collect();
    assert_eq!(
        errors,
        vec!["ERROR c: { n: 1 }", "ERROR b: { n: 1 }", "ERROR a: { n: 1 }"]
    );
}

#[test]
fn test_chain_survives_anyhow_helper() {
    let (defensive, _) = runtime();
    let c = defensive
        .create_contract("svc#c")
        .func(|_| Err(Fault::msg("boom")))
        .unwrap();

    fn forward(c: &Contract) -> anyhow::Result<Value> {
        Ok(c.call(vec![])?)
    }

    let b = {
        let c = c.clone();
        defensive
            .create_contract("svc#b")
            .func(move |_| Ok(forward(&c)?))
            .unwrap()
    };

    let err = b.call(vec![]).unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(err.signatures(), vec!["svc#c", "svc#b"]);
    assert!(!err.is_validation());
}

#[tokio::test]
async fn test_async_chain_collects_frames_innermost_first() {
    let (defensive, logs) = runtime();
    let c = defensive
        .create_contract("svc#c")
        .async_func(|_| async { Err(Fault::msg("boom")) })
        .unwrap();
    let b = {
        let c = c.clone();
        defensive
            .create_contract("svc#b")
            .async_func(move |_| {
                let c = c.clone();
                async move { Ok::<_, Fault>(c.call(vec![]).await?) }
            })
            .unwrap()
    };
    let a = {
        let b = b.clone();
        defensive
            .create_contract("svc#a")
            .async_func(move |_| {
                let b = b.clone();
                async move { Ok::<_, Fault>(b.call(vec![]).await?) }
            })
            .unwrap()
    };

    let err = a.call(vec![]).await.unwrap_err();
    assert_eq!(err.signatures(), vec!["svc#c", "svc#b", "svc#a"]);

    let report = err.report();
    assert_eq!(report.error, "CONTRACT_ERROR");
    assert_eq!(report.message, "boom");

    let enters: Vec<(u64, String)> = logs
        .lines_at(LogLevel::Debug)
        .into_iter()
        .map(|l| (l.id, l.message))
        .collect();
    assert_eq!(
        enters,
        vec![
            (1, "ENTER a:".to_string()),
            (2, "ENTER b:".to_string()),
            (3, "ENTER c:".to_string()),
        ]
    );
    assert_eq!(defensive.tracker().open_roots(), 0);
}

#[tokio::test]
async fn test_nested_validation_error_keeps_kind() {
    let (defensive, _) = runtime();
    let inner = defensive
        .create_contract("svc#inner")
        .params(["a"])
        .schema(SchemaMap::new().key("a", Schema::number().min(0)))
        .async_func(|args| async move { Ok(args[0].clone()) })
        .unwrap();
    let outer = {
        let inner = inner.clone();
        defensive
            .create_contract("svc#outer")
            .params(["a"])
            .async_func(move |args| {
                let inner = inner.clone();
                async move { Ok::<_, Fault>(inner.call(args).await?) }
            })
            .unwrap()
    };

    let err = outer.call(vec![json!(-1)]).await.unwrap_err();
    assert!(err.is_validation());
    assert_eq!(err.validation().map(|v| v.path.as_str()), Some("a"));
    assert_eq!(err.signatures(), vec!["svc#inner", "svc#outer"]);
    assert_eq!(err.report().error, "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_concurrent_roots_interleave_in_entry_order() {
    let (defensive, logs) = runtime();
    let leaf = defensive
        .create_contract("svc#leaf")
        .async_func(|_| async { Ok(Value::Null) })
        .unwrap();
    let step = {
        let leaf = leaf.clone();
        let tracker = defensive.tracker().clone();
        defensive
            .create_contract("svc#step")
            .params(["delay"])
            .async_func(move |args| {
                let leaf = leaf.clone();
                let tracker = tracker.clone();
                async move {
                    let delay = args[0].as_u64().unwrap_or_default();
                    tracker.sleep(Duration::from_millis(delay)).await;
                    Ok::<_, Fault>(leaf.call(vec![]).await?)
                }
            })
            .unwrap()
    };

    let slow = {
        let step = step.clone();
        tokio::spawn(
            defensive.run_with_context((), async move { step.call(vec![json!(100)]).await }),
        )
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    let fast = {
        let step = step.clone();
        tokio::spawn(defensive.run_with_context((), async move { step.call(vec![json!(0)]).await }))
    };
    fast.await.unwrap().unwrap();
    slow.await.unwrap().unwrap();

    let lines: Vec<(u64, String)> = logs
        .lines_at(LogLevel::Debug)
        .into_iter()
        .map(|l| (l.id, l.message))
        .collect();
    assert_eq!(
        lines,
        vec![
            (1, "ENTER step:".to_string()),
            (2, "ENTER step:".to_string()),
            (3, "ENTER leaf:".to_string()),
            (3, " EXIT leaf:".to_string()),
            (2, " EXIT step:".to_string()),
            (4, "ENTER leaf:".to_string()),
            (4, " EXIT leaf:".to_string()),
            (1, " EXIT step:".to_string()),
        ]
    );
    assert_eq!(defensive.tracker().open_roots(), 0);
}
