//! Browser binding for the simulation engine.

use serde::Serialize;
use serde_wasm_bindgen::{from_value, Serializer};
use sim_core::{Engine, SimulationRequest};
use wasm_bindgen::prelude::*;

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&Serializer::json_compatible())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Request names of the registered models, `domain/model_type`.
pub fn model_names(engine: &Engine) -> Vec<String> {
    engine
        .registry()
        .keys()
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Holds one engine (and its registry) for the lifetime of the page.
#[wasm_bindgen]
pub struct WasmEngine {
    engine: Engine,
}

#[wasm_bindgen]
impl WasmEngine {
    #[wasm_bindgen(constructor)]
    pub fn new() -> WasmEngine {
        console_error_panic_hook::set_once();
        WasmEngine {
            engine: Engine::with_builtin_models(),
        }
    }

    /// Runs a request object. Engine failures come back as results with
    /// `status: "error"`; only an undecodable request throws.
    pub fn simulate(&self, request: JsValue) -> Result<JsValue, JsValue> {
        let request: SimulationRequest = from_value(request)
            .map_err(|e| JsValue::from_str(&format!("Invalid request: {}", e)))?;
        let result = self.engine.simulate(&request, None);
        to_js(&result)
    }

    pub fn registered_models(&self) -> Result<JsValue, JsValue> {
        to_js(&model_names(&self.engine))
    }

    pub fn health(&self) -> Result<JsValue, JsValue> {
        to_js(&self.engine.health(None))
    }
}

impl Default for WasmEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_names_are_sorted_keys() {
        let engine = Engine::with_builtin_models();
        let names = model_names(&engine);
        assert_eq!(names.len(), 5);
        assert_eq!(names[0], "epidemiology/Logistic");
        assert!(names.contains(&"physics/Projectile".to_string()));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use serde_wasm_bindgen::to_value;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn sir_request(method: &str) -> JsValue {
        let request = SimulationRequest::new(
            "epidemiology",
            "SIR",
            sim_core::TimeSpan::new(0.0, 50.0, 51),
        )
        .initial("S", 0.99)
        .initial("I", 0.01)
        .initial("R", 0.0)
        .method(method);
        to_value(&request).expect("request")
    }

    fn field(value: &JsValue, name: &str) -> JsValue {
        js_sys::Reflect::get(value, &JsValue::from_str(name)).expect("field")
    }

    #[wasm_bindgen_test]
    fn simulate_returns_success_object() {
        let engine = WasmEngine::new();
        let result = engine.simulate(sir_request("RK45")).expect("result");
        assert_eq!(field(&result, "status").as_string().as_deref(), Some("success"));
        let data = js_sys::Array::from(&field(&result, "data"));
        assert_eq!(data.length(), 51);
    }

    #[wasm_bindgen_test]
    fn engine_errors_do_not_throw() {
        let engine = WasmEngine::new();
        let result = engine.simulate(sir_request("Euler")).expect("result");
        assert_eq!(field(&result, "status").as_string().as_deref(), Some("error"));
        let message = field(&result, "message").as_string().unwrap_or_default();
        assert!(message.starts_with("UnsupportedMethodError"));
    }

    #[wasm_bindgen_test]
    fn undecodable_request_throws() {
        let engine = WasmEngine::new();
        let result = engine.simulate(JsValue::from_str("not a request"));
        let message = result.err().and_then(|err| err.as_string()).unwrap_or_default();
        assert!(message.contains("Invalid request"));
    }

    #[wasm_bindgen_test]
    fn health_reports_solver_count() {
        let engine = WasmEngine::new();
        let health = engine.health().expect("health");
        assert_eq!(field(&health, "solvers").as_f64(), Some(5.0));
    }
}
