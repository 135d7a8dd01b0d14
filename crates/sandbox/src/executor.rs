//! Sandbox executor.
//!
//! Every call gets a brand-new QuickJS runtime and context on a blocking
//! thread. The runtime carries a memory and stack ceiling and an interrupt
//! handler that aborts evaluation once the wall-clock deadline passes. The
//! only host function reachable from script code is `http`; the context
//! otherwise holds nothing but the standard ECMAScript built-ins (no module
//! loader, no console, no timers, no filesystem or process access).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rquickjs::{Context, Ctx, Function, Runtime};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::compiler::transpile;
use crate::http::{HttpCapability, HttpRequest, UreqHttp};
use crate::{CompiledScript, Dialect, SandboxConfig, SandboxError};

/// Extra time granted to the blocking thread on top of the script budget
/// before the caller stops waiting for it.
const JOIN_GRACE: Duration = Duration::from_secs(1);

/// Thrown by the first line of the syntax check. The whole script is
/// parsed before that line runs, so reaching it means the source parsed
/// and none of it was executed.
const SYNTAX_GUARD: &str = "__sandbox_syntax_ok__";

/// Lines the guard adds in front of the checked source.
const SYNTAX_GUARD_LINES: u32 = 1;

/// Installs `http` as a non-writable global and removes the raw bridge.
const HTTP_PRELUDE: &str = r#"
(function (bridge) {
  function http(request) {
    if (typeof request === 'string') { request = { url: request }; }
    const reply = JSON.parse(bridge(JSON.stringify(request === undefined ? {} : request)));
    if (reply.error !== undefined) { throw new Error(reply.error); }
    return reply.response;
  }
  Object.defineProperty(globalThis, 'http', { value: http, enumerable: false, writable: false, configurable: false });
})(globalThis.__sandbox_http);
delete globalThis.__sandbox_http;
"#;

/// The entry point evaluated after the script has been loaded.
///
/// Arguments are handed over as JSON and spread into the call, so
/// `EntryCall::function("handle", vec![payload])` evaluates
/// `handle(payload)` with `payload` as a plain object.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryCall {
    expression: String,
    args: Vec<Value>,
}

impl EntryCall {
    /// Call a global function by name with JSON arguments.
    pub fn function(name: &str, args: Vec<Value>) -> Self {
        Self {
            expression: format!("{name}(...JSON.parse(globalThis.__sandbox_args))"),
            args,
        }
    }

    /// Evaluate an arbitrary expression against the loaded script.
    pub fn expression(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            args: Vec::new(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.expression
    }
}

/// What the engine needs from a script sandbox.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    /// Lower and syntax-check a snippet without running it.
    async fn compile(
        &self,
        source: &str,
        dialect: Option<Dialect>,
    ) -> Result<CompiledScript, SandboxError>;

    /// Load `script`, evaluate `call`, and return its (awaited) result.
    async fn execute(&self, script: &CompiledScript, call: &EntryCall)
        -> Result<Value, SandboxError>;
}

/// QuickJS-backed [`ScriptRunner`].
#[derive(Clone)]
pub struct Sandbox {
    config: SandboxConfig,
    http: Arc<dyn HttpCapability>,
}

impl Sandbox {
    /// A sandbox whose `http` capability performs real requests.
    pub fn new(config: SandboxConfig) -> Self {
        Self::with_http(config, Arc::new(UreqHttp))
    }

    pub fn with_http(config: SandboxConfig, http: Arc<dyn HttpCapability>) -> Self {
        Self { config, http }
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    async fn run_blocking<T, F>(&self, job: F) -> Result<T, SandboxError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, SandboxError> + Send + 'static,
    {
        let limit = self.config.timeout;
        match tokio::time::timeout(limit + JOIN_GRACE, tokio::task::spawn_blocking(job)).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SandboxError::internal(join_err)),
            Err(_) => {
                warn!("sandbox thread did not return within {:?}", limit + JOIN_GRACE);
                Err(SandboxError::Timeout { limit })
            }
        }
    }
}

#[async_trait]
impl ScriptRunner for Sandbox {
    #[instrument(skip(self, source))]
    async fn compile(
        &self,
        source: &str,
        dialect: Option<Dialect>,
    ) -> Result<CompiledScript, SandboxError> {
        let compiled = transpile(source, dialect);
        let config = self.config.clone();
        let lowered = compiled.source().to_owned();
        self.run_blocking(move || check_syntax(&config, lowered)).await?;
        Ok(compiled)
    }

    #[instrument(skip(self, script, call), fields(dialect = %script.dialect()))]
    async fn execute(
        &self,
        script: &CompiledScript,
        call: &EntryCall,
    ) -> Result<Value, SandboxError> {
        let config = self.config.clone();
        let http = Arc::clone(&self.http);
        let source = script.source().to_owned();
        let call = call.clone();

        let started = Instant::now();
        let result = self
            .run_blocking(move || run_isolated(&config, http, source, &call))
            .await;
        debug!(elapsed = ?started.elapsed(), ok = result.is_ok(), "sandbox call finished");
        result
    }
}

// ---------------------------------------------------------------------------
// Interpreter plumbing (runs on the blocking thread)
// ---------------------------------------------------------------------------

struct Isolate {
    runtime: Runtime,
    context: Context,
    interrupted: Arc<AtomicBool>,
    deadline: Instant,
    limit: Duration,
}

impl Isolate {
    fn new(config: &SandboxConfig) -> Result<Self, SandboxError> {
        let runtime = Runtime::new().map_err(SandboxError::internal)?;
        runtime.set_memory_limit(config.memory_limit);
        runtime.set_max_stack_size(config.max_stack_size);

        let deadline = Instant::now() + config.timeout;
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&interrupted);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                flag.store(true, Ordering::Relaxed);
                true
            } else {
                false
            }
        })));

        let context = Context::full(&runtime).map_err(SandboxError::internal)?;
        Ok(Self {
            runtime,
            context,
            interrupted,
            deadline,
            limit: config.timeout,
        })
    }

    fn timed_out(&self) -> bool {
        self.interrupted.load(Ordering::Relaxed)
    }

    /// Replace whatever error surfaced with `Timeout` if the interrupt fired.
    fn classify(&self, err: SandboxError) -> SandboxError {
        if self.timed_out() {
            SandboxError::Timeout { limit: self.limit }
        } else {
            err
        }
    }

    /// Drain the job queue so pending promise reactions run.
    fn drain_jobs(&self) -> Result<(), SandboxError> {
        loop {
            match self.runtime.execute_pending_job() {
                Ok(true) => continue,
                Ok(false) => return Ok(()),
                Err(_) if self.timed_out() => {
                    return Err(SandboxError::Timeout { limit: self.limit })
                }
                // Rejections are captured by the settle handlers.
                Err(_) => continue,
            }
        }
    }
}

fn check_syntax(config: &SandboxConfig, source: String) -> Result<(), SandboxError> {
    let isolate = Isolate::new(config)?;
    let guarded = format!("throw '{SYNTAX_GUARD}';\n{source}");
    let result = isolate.context.with(|ctx| -> Result<(), SandboxError> {
        match ctx.eval::<rquickjs::Value, _>(guarded.as_str()) {
            Ok(_) => Err(SandboxError::internal("syntax check ran past its guard")),
            Err(rquickjs::Error::Exception) => {
                let exception = ctx.catch();
                let reached_guard = exception
                    .as_string()
                    .and_then(|s| s.to_string().ok())
                    .is_some_and(|s| s == SYNTAX_GUARD);
                if reached_guard {
                    Ok(())
                } else {
                    Err(exception_error(exception, Some(source.as_str())))
                }
            }
            Err(err) => Err(SandboxError::internal(err)),
        }
    });
    result.map_err(|e| isolate.classify(e))
}

fn run_isolated(
    config: &SandboxConfig,
    http: Arc<dyn HttpCapability>,
    source: String,
    call: &EntryCall,
) -> Result<Value, SandboxError> {
    let isolate = Isolate::new(config)?;
    let args = serde_json::to_string(&call.args).map_err(SandboxError::internal)?;
    let deadline = isolate.deadline;

    isolate
        .context
        .with(|ctx| -> Result<(), SandboxError> {
            install_http(&ctx, http, deadline).map_err(SandboxError::internal)?;
            ctx.globals()
                .set("__sandbox_args", args)
                .map_err(SandboxError::internal)?;
            ctx.eval::<rquickjs::Value, _>(source.as_str())
                .map_err(|e| script_error(&ctx, e, None))?;
            ctx.eval::<rquickjs::Value, _>(settle_script(&call.expression))
                .map_err(|e| script_error(&ctx, e, None))?;
            Ok(())
        })
        .map_err(|e| isolate.classify(e))?;

    isolate.drain_jobs()?;

    let outcome: Option<String> = isolate
        .context
        .with(|ctx| ctx.globals().get::<_, Option<String>>("__sandbox_outcome"))
        .map_err(SandboxError::internal)?;

    match outcome {
        Some(raw) => decode_outcome(&raw),
        None if isolate.timed_out() => Err(SandboxError::Timeout { limit: isolate.limit }),
        None => Err(SandboxError::Runtime {
            name: "Error".into(),
            message: "entry call never settled".into(),
        }),
    }
}

fn install_http(
    ctx: &Ctx<'_>,
    http: Arc<dyn HttpCapability>,
    deadline: Instant,
) -> rquickjs::Result<()> {
    let bridge = Function::new(ctx.clone(), move |request: String| -> String {
        http_bridge(http.as_ref(), &request, deadline)
    })?;
    ctx.globals().set("__sandbox_http", bridge)?;
    ctx.eval::<rquickjs::Value, _>(HTTP_PRELUDE)?;
    Ok(())
}

fn http_bridge(http: &dyn HttpCapability, raw: &str, deadline: Instant) -> String {
    let reply = match serde_json::from_str::<HttpRequest>(raw) {
        Err(e) => json!({ "error": format!("invalid http request: {e}") }),
        Ok(request) => {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                json!({ "error": "time limit reached before the request was sent" })
            } else {
                debug!(method = %request.method, url = %request.url, "sandbox http request");
                match http.send(&request, remaining) {
                    Ok(response) => json!({ "response": response }),
                    Err(message) => json!({ "error": message }),
                }
            }
        }
    };
    reply.to_string()
}

/// Wraps the entry expression so both sync and async results (and throws)
/// end up serialised in `__sandbox_outcome`.
fn settle_script(expression: &str) -> String {
    format!(
        r#"(function () {{
  globalThis.__sandbox_outcome = undefined;
  const fail = (err) => {{
    const isObject = err !== null && typeof err === 'object';
    const name = isObject && err.name ? String(err.name) : 'Error';
    const message = isObject && 'message' in err ? String(err.message) : String(err);
    globalThis.__sandbox_outcome = JSON.stringify({{ ok: false, name: name, message: message }});
  }};
  const succeed = (value) => {{
    try {{
      globalThis.__sandbox_outcome = JSON.stringify({{ ok: true, value: value === undefined ? null : value }});
    }} catch (err) {{
      globalThis.__sandbox_outcome = JSON.stringify({{ ok: false, invalid: true, name: 'TypeError', message: String(err && err.message) }});
    }}
  }};
  try {{
    Promise.resolve({expression}).then(succeed, fail);
  }} catch (err) {{
    fail(err);
  }}
}})();"#
    )
}

#[derive(Debug, Deserialize)]
struct Outcome {
    ok: bool,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    invalid: bool,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

fn decode_outcome(raw: &str) -> Result<Value, SandboxError> {
    let outcome: Outcome =
        serde_json::from_str(raw).map_err(|e| SandboxError::InvalidResult(e.to_string()))?;
    if outcome.ok {
        return Ok(outcome.value);
    }
    let message = outcome.message.unwrap_or_default();
    if outcome.invalid {
        return Err(SandboxError::InvalidResult(message));
    }
    Err(SandboxError::Runtime {
        name: outcome.name.unwrap_or_else(|| "Error".into()),
        message,
    })
}

/// Convert an interpreter error into a [`SandboxError`], reading the pending
/// exception's `name`, `message` and (for parse errors) `lineNumber`.
fn script_error(ctx: &Ctx<'_>, err: rquickjs::Error, checked: Option<&str>) -> SandboxError {
    if !matches!(err, rquickjs::Error::Exception) {
        return SandboxError::internal(err);
    }
    exception_error(ctx.catch(), checked)
}

/// `checked` is the original source when the exception came from the
/// guarded syntax check.
fn exception_error(exception: rquickjs::Value<'_>, checked: Option<&str>) -> SandboxError {
    let (name, message, line) = match exception.as_object() {
        Some(obj) => (
            obj.get::<_, Option<String>>("name").ok().flatten(),
            obj.get::<_, Option<String>>("message").ok().flatten(),
            obj.get::<_, Option<i32>>("lineNumber").ok().flatten(),
        ),
        None => (None, exception.get::<String>().ok(), None),
    };
    let name = name.unwrap_or_else(|| "Error".into());
    let message = message.unwrap_or_else(|| "uncaught exception".into());

    if name != "SyntaxError" {
        return SandboxError::Runtime { name, message };
    }

    let line = line.and_then(|l| u32::try_from(l).ok()).map(|l| {
        if checked.is_some() && l > SYNTAX_GUARD_LINES {
            l - SYNTAX_GUARD_LINES
        } else {
            l.max(1)
        }
    });
    let context = match (line, checked) {
        (Some(l), Some(src)) => src
            .lines()
            .nth(l as usize - 1)
            .map(|text| format!(" near `{}`", text.trim()))
            .unwrap_or_default(),
        _ => String::new(),
    };
    let message = match line {
        Some(l) => format!("line {l}: {message}{context}"),
        None => message,
    };
    SandboxError::Syntax { message, line }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{DisabledHttp, HttpResponse};
    use std::sync::Mutex;

    fn sandbox() -> Sandbox {
        Sandbox::with_http(
            SandboxConfig::default().with_timeout(Duration::from_millis(500)),
            Arc::new(DisabledHttp),
        )
    }

    async fn run(source: &str, call: EntryCall) -> Result<Value, SandboxError> {
        let sb = sandbox();
        let script = sb.compile(source, None).await?;
        sb.execute(&script, &call).await
    }

    struct RecordingHttp {
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl HttpCapability for RecordingHttp {
        fn send(&self, request: &HttpRequest, _timeout: Duration) -> Result<HttpResponse, String> {
            self.seen.lock().unwrap().push(request.clone());
            Ok(HttpResponse {
                data: json!({ "echo": request.url }),
                status: 201,
                status_text: "Created".into(),
            })
        }
    }

    #[tokio::test]
    async fn entry_function_receives_json_arguments() {
        let out = run(
            "function handle(ctx) { return { doubled: ctx.input.n * 2 }; }",
            EntryCall::function("handle", vec![json!({ "input": { "n": 21 } })]),
        )
        .await
        .expect("script runs");
        assert_eq!(out, json!({ "doubled": 42 }));
    }

    #[tokio::test]
    async fn async_entry_functions_are_awaited() {
        let out = run(
            "async function handle(x) { const v = await Promise.resolve(x + 1); return v; }",
            EntryCall::function("handle", vec![json!(1)]),
        )
        .await
        .expect("script runs");
        assert_eq!(out, json!(2));
    }

    #[tokio::test]
    async fn typed_scripts_run_after_erasure() {
        let out = run(
            "interface In { n: number }\nexport function handle(i: In): number { return (i.n as number) + 1; }",
            EntryCall::function("handle", vec![json!({ "n": 1 })]),
        )
        .await
        .expect("script runs");
        assert_eq!(out, json!(2));
    }

    #[tokio::test]
    async fn undefined_result_becomes_null() {
        let out = run("function handle() {}", EntryCall::function("handle", vec![]))
            .await
            .expect("script runs");
        assert_eq!(out, Value::Null);
    }

    #[tokio::test]
    async fn thrown_errors_are_runtime_failures() {
        let err = run(
            "function handle() { throw new TypeError('bad input'); }",
            EntryCall::function("handle", vec![]),
        )
        .await
        .unwrap_err();
        assert_eq!(
            err,
            SandboxError::Runtime {
                name: "TypeError".into(),
                message: "bad input".into()
            }
        );
    }

    #[tokio::test]
    async fn syntax_errors_are_reported_by_compile() {
        let err = sandbox()
            .compile("function handle( {\n  return 1;\n}", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Syntax { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn syntax_error_lines_refer_to_the_submitted_source() {
        let err = sandbox()
            .compile("const a = 1;\nconst b = ;\n", None)
            .await
            .unwrap_err();
        match err {
            SandboxError::Syntax { line, .. } => {
                assert!(line.is_none() || line == Some(2), "line {line:?}")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn function_body_only_code_is_rejected_at_compile() {
        let err = sandbox().compile("return 1;", None).await.unwrap_err();
        assert!(matches!(err, SandboxError::Syntax { .. }), "got {err:?}");
    }

    #[tokio::test]
    async fn compile_never_runs_the_script() {
        // Would hang until the timeout if any of it were evaluated.
        let err = sandbox()
            .compile("}); for (;;) {} (function () {", None)
            .await
            .unwrap_err();
        assert!(matches!(err, SandboxError::Syntax { .. }), "got {err:?}");

        sandbox()
            .compile("for (;;) {}\nfunction handle() { return 1; }", None)
            .await
            .expect("a looping but well-formed script parses");
    }

    #[tokio::test]
    async fn host_capabilities_other_than_http_are_absent() {
        for expr in ["require('fs')", "process.env", "fetch('http://x')", "setTimeout(() => 1, 1)"] {
            let err = run(
                &format!("function handle() {{ return {expr}; }}"),
                EntryCall::function("handle", vec![]),
            )
            .await
            .unwrap_err();
            match err {
                SandboxError::Runtime { name, .. } => assert_eq!(name, "ReferenceError", "{expr}"),
                other => panic!("{expr}: unexpected {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn infinite_loops_time_out() {
        let started = Instant::now();
        let err = run(
            "function handle() { while (true) {} }",
            EntryCall::function("handle", vec![]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, SandboxError::Timeout { .. }), "got {err:?}");
        assert!(started.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn globals_do_not_leak_between_calls() {
        let sb = sandbox();
        let script = sb
            .compile("function handle() { globalThis.counter = (globalThis.counter || 0) + 1; return globalThis.counter; }", None)
            .await
            .expect("compiles");
        let call = EntryCall::function("handle", vec![]);
        assert_eq!(sb.execute(&script, &call).await, Ok(json!(1)));
        assert_eq!(sb.execute(&script, &call).await, Ok(json!(1)));
    }

    #[tokio::test]
    async fn http_capability_is_injected() {
        let http = Arc::new(RecordingHttp {
            seen: Mutex::new(Vec::new()),
        });
        let sb = Sandbox::with_http(SandboxConfig::default(), http.clone());
        let script = sb
            .compile(
                "async function handle() { const r = await http({ url: 'https://api.test/x', method: 'POST', data: { a: 1 } }); return [r.status, r.statusText, r.data.echo]; }",
                None,
            )
            .await
            .expect("compiles");
        let out = sb
            .execute(&script, &EntryCall::function("handle", vec![]))
            .await
            .expect("runs");
        assert_eq!(out, json!([201, "Created", "https://api.test/x"]));

        let seen = http.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, "POST");
        assert_eq!(seen[0].data, Some(json!({ "a": 1 })));
    }

    #[tokio::test]
    async fn http_transport_errors_throw_inside_the_script() {
        let out = run(
            "function handle() { try { http('https://blocked.test'); return 'sent'; } catch (e) { return 'caught'; } }",
            EntryCall::function("handle", vec![]),
        )
        .await
        .expect("runs");
        assert_eq!(out, json!("caught"));
    }

    #[tokio::test]
    async fn raw_expressions_can_be_evaluated() {
        let out = run("const base = 40;", EntryCall::expression("base + 2"))
            .await
            .expect("runs");
        assert_eq!(out, json!(42));
    }
}
