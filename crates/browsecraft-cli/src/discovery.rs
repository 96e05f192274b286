//! Walks a parsed feature file's AST into one `WorkItem` per scenario, for
//! the scheduler to distribute. Outline expansion is left to the executor;
//! a Scenario Outline is scheduled as a single work item.

use browsecraft_gherkin::{FeatureChild, GherkinDocument, RuleChild};
use browsecraft_scheduler::WorkItem;

fn tag_names(tags: &[browsecraft_gherkin::Tag]) -> Vec<String> {
    tags.iter().map(|t| t.name.trim_start_matches('@').to_string()).collect()
}

pub fn discover_work_items(doc: &GherkinDocument) -> Vec<WorkItem> {
    let Some(feature) = &doc.feature else { return Vec::new() };
    let uri = doc.uri.clone().unwrap_or_default();
    let feature_tags = tag_names(&feature.tags);

    let mut items = Vec::new();
    for child in &feature.children {
        match child {
            FeatureChild::Scenario(scenario) => {
                let mut tags = feature_tags.clone();
                tags.extend(tag_names(&scenario.tags));
                items.push(work_item(&uri, &scenario.name, scenario.line, tags));
            }
            FeatureChild::Rule(rule) => {
                let mut rule_tags = feature_tags.clone();
                rule_tags.extend(tag_names(&rule.tags));
                for rule_child in &rule.children {
                    if let RuleChild::Scenario(scenario) = rule_child {
                        let mut tags = rule_tags.clone();
                        tags.extend(tag_names(&scenario.tags));
                        items.push(work_item(&uri, &scenario.name, scenario.line, tags));
                    }
                }
            }
            FeatureChild::Background(_) => {}
        }
    }
    items
}

fn work_item(uri: &str, name: &str, line: usize, tags: Vec<String>) -> WorkItem {
    WorkItem {
        id: format!("{uri}::{line}::{name}"),
        title: name.to_string(),
        tags,
        suite_path: uri.to_string(),
    }
}
