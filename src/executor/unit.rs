//! Unit flattening
//!
//! Expands suites and cases into independently schedulable execution units.

use futures::future::BoxFuture;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::models::{
    BodyResult, CaseInfo, CleanupHook, ParameterSet, TestCase, TestSuite, UnitId,
};

/// Thunk that runs the case body with its bound arguments
pub type Invoke = Arc<dyn Fn(CancellationToken) -> BoxFuture<'static, BodyResult> + Send + Sync>;

/// The flattened, independently schedulable atom of work
#[derive(Clone)]
pub struct ExecutionUnit {
    pub id: UnitId,
    pub suite_name: String,
    pub case_name: String,
    pub display_name: Option<String>,
    pub skip: bool,
    pub skip_reason: Option<String>,
    pub timeout: Option<Duration>,
    pub arguments: Option<Vec<Value>>,
    pub invoke: Invoke,
    pub cleanup: Option<CleanupHook>,
}

impl fmt::Debug for ExecutionUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionUnit")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("skip", &self.skip)
            .field("skip_reason", &self.skip_reason)
            .field("timeout", &self.timeout)
            .field("arguments", &self.arguments)
            .finish_non_exhaustive()
    }
}

/// Flatten suites into units in suite, case, parameter-set order
pub fn flatten(suites: &[TestSuite]) -> Vec<ExecutionUnit> {
    let mut units = Vec::new();

    for (suite_index, suite) in suites.iter().enumerate() {
        for (case_index, case) in suite.cases.iter().enumerate() {
            let info = case.info();
            let timeout = effective_timeout(suite, info);

            match case {
                TestCase::Simple { body, cleanup, .. } => {
                    let body = body.clone();
                    units.push(ExecutionUnit {
                        id: UnitId::new(suite_index, &suite.name, case_index, &info.name, None),
                        suite_name: suite.name.clone(),
                        case_name: info.name.clone(),
                        display_name: info.display_name.clone(),
                        skip: suite.skip || info.skip,
                        skip_reason: skip_reason(&[
                            (info.skip, &info.skip_reason),
                            (suite.skip, &suite.skip_reason),
                        ]),
                        timeout,
                        arguments: None,
                        invoke: Arc::new(move |token| body(token)),
                        cleanup: cleanup.clone(),
                    });
                }
                TestCase::Parameterized {
                    parameter_sets,
                    body,
                    cleanup,
                    ..
                } if parameter_sets.is_empty() => {
                    // No data degenerates to a single run with zero arguments
                    let body = body.clone();
                    units.push(ExecutionUnit {
                        id: UnitId::new(suite_index, &suite.name, case_index, &info.name, None),
                        suite_name: suite.name.clone(),
                        case_name: info.name.clone(),
                        display_name: info.display_name.clone(),
                        skip: suite.skip || info.skip,
                        skip_reason: skip_reason(&[
                            (info.skip, &info.skip_reason),
                            (suite.skip, &suite.skip_reason),
                        ]),
                        timeout,
                        arguments: None,
                        invoke: Arc::new(move |token| body(Vec::new(), token)),
                        cleanup: cleanup.clone(),
                    });
                }
                TestCase::Parameterized {
                    parameter_sets,
                    body,
                    cleanup,
                    ..
                } => {
                    for (parameter_index, set) in parameter_sets.iter().enumerate() {
                        let body = body.clone();
                        let arguments = set.arguments.clone();
                        units.push(ExecutionUnit {
                            id: UnitId::new(
                                suite_index,
                                &suite.name,
                                case_index,
                                &info.name,
                                Some(parameter_index),
                            ),
                            suite_name: suite.name.clone(),
                            case_name: info.name.clone(),
                            display_name: Some(parameter_display_name(info, set)),
                            skip: suite.skip || info.skip || set.skip,
                            skip_reason: skip_reason(&[
                                (set.skip, &set.skip_reason),
                                (info.skip, &info.skip_reason),
                                (suite.skip, &suite.skip_reason),
                            ]),
                            timeout,
                            arguments: Some(set.arguments.clone()),
                            invoke: Arc::new(move |token| body(arguments.clone(), token)),
                            cleanup: cleanup.clone(),
                        });
                    }
                }
            }
        }
    }

    units
}

/// Negative timeouts are treated as "no timeout"
fn effective_timeout(suite: &TestSuite, info: &CaseInfo) -> Option<Duration> {
    let timeout = info.timeout?;
    match timeout.to_std() {
        Ok(timeout) => Some(timeout),
        Err(_) => {
            warn!(
                "Ignoring negative timeout ({}ms) on {}::{}",
                timeout.num_milliseconds(),
                suite.name,
                info.name
            );
            None
        }
    }
}

/// First reason among the levels that are actually skipped, in precedence order
fn skip_reason(levels: &[(bool, &Option<String>)]) -> Option<String> {
    levels
        .iter()
        .filter(|(skip, _)| *skip)
        .find_map(|(_, reason)| (*reason).clone())
}

fn parameter_display_name(info: &CaseInfo, set: &ParameterSet) -> String {
    if let Some(name) = &set.display_name {
        return name.clone();
    }

    let base = info.display_name.as_deref().unwrap_or(&info.name);
    let args: Vec<String> = set.arguments.iter().map(|v| v.to_string()).collect();
    format!("{}({})", base, args.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as TimeDelta;
    use serde_json::json;

    fn passing(name: &str) -> TestCase {
        TestCase::simple(name, |_| async { Ok(()) })
    }

    #[test]
    fn test_flatten_order() {
        let suites = vec![
            TestSuite::new("b-suite").with_cases([passing("one"), passing("two")]),
            TestSuite::new("a-suite").with_case(TestCase::parameterized(
                "params",
                vec![
                    ParameterSet::new(vec![json!(1)]),
                    ParameterSet::new(vec![json!(2)]),
                ],
                |_, _| async { Ok(()) },
            )),
        ];

        let keys: Vec<String> = flatten(&suites).iter().map(|u| u.id.to_string()).collect();
        assert_eq!(
            keys,
            vec![
                "b-suite::one",
                "b-suite::two",
                "a-suite::params[0]",
                "a-suite::params[1]",
            ]
        );
    }

    #[test]
    fn test_flatten_empty_parameter_sets() {
        let suites = vec![TestSuite::new("s").with_case(TestCase::parameterized(
            "no-data",
            Vec::new(),
            |args, _| async move {
                assert!(args.is_empty());
                Ok(())
            },
        ))];

        let units = flatten(&suites);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].id.key, "s::no-data");
        assert!(units[0].arguments.is_none());
    }

    #[test]
    fn test_skip_precedence() {
        let suites = vec![TestSuite::new("s").skip("suite reason").with_case(
            TestCase::parameterized(
                "p",
                vec![
                    ParameterSet::new(vec![json!("a")]).skip("set reason"),
                    ParameterSet::new(vec![json!("b")]),
                ],
                |_, _| async { Ok(()) },
            )
            .skip("case reason"),
        )];

        let units = flatten(&suites);
        assert!(units.iter().all(|u| u.skip));
        assert_eq!(units[0].skip_reason.as_deref(), Some("set reason"));
        assert_eq!(units[1].skip_reason.as_deref(), Some("case reason"));
    }

    #[test]
    fn test_skip_reason_ignores_unskipped_levels() {
        let mut suite = TestSuite::new("s").with_case(passing("c").skip("case reason"));
        suite.skip_reason = Some("stale reason".to_string());

        let units = flatten(&[suite]);
        assert!(units[0].skip);
        assert_eq!(units[0].skip_reason.as_deref(), Some("case reason"));
    }

    #[test]
    fn test_negative_timeout_becomes_none() {
        let suites = vec![TestSuite::new("s").with_cases([
            passing("neg").with_timeout_delta(TimeDelta::milliseconds(-10)),
            passing("pos").with_timeout_delta(TimeDelta::milliseconds(10)),
        ])];

        let units = flatten(&suites);
        assert_eq!(units[0].timeout, None);
        assert_eq!(units[1].timeout, Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_parameter_display_names() {
        let suites = vec![TestSuite::new("s").with_case(TestCase::parameterized(
            "add",
            vec![
                ParameterSet::new(vec![json!(1), json!(2)]),
                ParameterSet::new(vec![json!(3)]).with_display_name("three"),
            ],
            |_, _| async { Ok(()) },
        ))];

        let units = flatten(&suites);
        assert_eq!(units[0].display_name.as_deref(), Some("add(1, 2)"));
        assert_eq!(units[1].display_name.as_deref(), Some("three"));
        assert_eq!(units[0].arguments, Some(vec![json!(1), json!(2)]));
    }
}
