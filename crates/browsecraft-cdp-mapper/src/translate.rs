//! The BiDi↔CDP translation table.
//!
//! Scoped to the subset of `browsingContext`/`script` commands and target
//! lifecycle events Browsecraft's Session facade actually issues. Anything
//! outside this table fails closed with `UnknownCommand` rather than being
//! forwarded best-effort — see `SPEC_FULL.md` §B.

use browsecraft_core::JsonMap;
use serde_json::{json, Value};

/// The CDP method + params a BiDi command translates to.
pub struct CdpRequest {
    pub method: String,
    pub params: JsonMap,
}

/// Translates one BiDi command into the CDP command that implements it.
/// Returns `None` for BiDi methods this mapper does not cover.
pub fn bidi_command_to_cdp(method: &str, params: &JsonMap) -> Option<CdpRequest> {
    match method {
        "browsingContext.create" => Some(CdpRequest {
            method: "Target.createTarget".to_string(),
            params: as_map(json!({"url": "about:blank"})),
        }),
        "browsingContext.navigate" => {
            let url = params.get("url")?.as_str()?.to_string();
            let context = params.get("context")?.as_str()?.to_string();
            Some(CdpRequest {
                method: "Page.navigate".to_string(),
                params: as_map(json!({"url": url, "targetId": context})),
            })
        }
        "browsingContext.close" => {
            let context = params.get("context")?.as_str()?.to_string();
            Some(CdpRequest {
                method: "Target.closeTarget".to_string(),
                params: as_map(json!({"targetId": context})),
            })
        }
        "browsingContext.getTree" => Some(CdpRequest {
            method: "Target.getTargets".to_string(),
            params: JsonMap::new(),
        }),
        "script.evaluate" => {
            let expression = params.get("expression")?.as_str()?.to_string();
            Some(CdpRequest {
                method: "Runtime.evaluate".to_string(),
                params: as_map(json!({"expression": expression, "returnByValue": true})),
            })
        }
        _ => None,
    }
}

/// Translates a CDP command's raw result back into the BiDi `result` shape
/// the originating command expects.
pub fn cdp_result_to_bidi(bidi_method: &str, cdp_result: &JsonMap) -> JsonMap {
    match bidi_method {
        "browsingContext.create" => {
            let context = cdp_result
                .get("targetId")
                .and_then(Value::as_str)
                .unwrap_or_default();
            as_map(json!({"context": context}))
        }
        "browsingContext.getTree" => {
            let contexts = cdp_result
                .get("targetInfos")
                .and_then(Value::as_array)
                .map(|targets| {
                    targets
                        .iter()
                        .filter_map(|t| t.get("targetId").and_then(Value::as_str))
                        .map(|id| json!({"context": id, "children": []}))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default();
            as_map(json!({"contexts": contexts}))
        }
        "script.evaluate" => {
            let result = cdp_result.get("result").cloned().unwrap_or(Value::Null);
            as_map(json!({"type": "success", "result": result}))
        }
        _ => cdp_result.clone(),
    }
}

/// Translates a spontaneous CDP event into its BiDi equivalent, if this
/// mapper tracks one.
pub fn cdp_event_to_bidi(cdp_method: &str, cdp_params: &JsonMap) -> Option<(String, JsonMap)> {
    match cdp_method {
        "Target.targetCreated" => {
            let context = cdp_params
                .get("targetInfo")
                .and_then(|info| info.get("targetId"))
                .and_then(Value::as_str)?
                .to_string();
            Some((
                "browsingContext.contextCreated".to_string(),
                as_map(json!({"context": context})),
            ))
        }
        "Log.entryAdded" => Some(("log.entryAdded".to_string(), cdp_params.clone())),
        _ => None,
    }
}

fn as_map(value: Value) -> JsonMap {
    match value {
        Value::Object(map) => map,
        _ => JsonMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translates_browsing_context_create() {
        let req = bidi_command_to_cdp("browsingContext.create", &JsonMap::new()).unwrap();
        assert_eq!(req.method, "Target.createTarget");
    }

    #[test]
    fn unmapped_command_returns_none() {
        assert!(bidi_command_to_cdp("network.addIntercept", &JsonMap::new()).is_none());
    }

    #[test]
    fn translates_create_result_back_to_bidi_context_shape() {
        let cdp_result = as_map(json!({"targetId": "T1"}));
        let bidi = cdp_result_to_bidi("browsingContext.create", &cdp_result);
        assert_eq!(bidi["context"], "T1");
    }

    #[test]
    fn translates_target_created_event() {
        let params = as_map(json!({"targetInfo": {"targetId": "T9"}}));
        let (name, bidi_params) = cdp_event_to_bidi("Target.targetCreated", &params).unwrap();
        assert_eq!(name, "browsingContext.contextCreated");
        assert_eq!(bidi_params["context"], "T9");
    }

    #[test]
    fn untracked_cdp_event_yields_no_bidi_event() {
        assert!(cdp_event_to_bidi("Network.requestWillBeSent", &JsonMap::new()).is_none());
    }
}
