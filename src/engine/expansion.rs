//! Scope Expansion Engine
//!
//! Walks the scope chain root first. Each level contributes its value tokens
//! (when embedded in names) to a running list of token lists; the product of
//! those lists with the level's own topic fragments, plus a trailing wildcard
//! sentinel, yields the candidate names for that level.

use super::permute::permute_joined;
use super::topic_config::TopicConfigMapping;
use super::utm::UtmBuilder;
use super::{EngineContext, Expansion};
use crate::error::Result;
use crate::model::{AdhocTopic, ScopeNode};
use tracing::{debug, info};

pub fn expand(ctx: &EngineContext) -> Result<Expansion> {
    let utm = UtmBuilder::new();
    let mut tcm = TopicConfigMapping::new();

    let mut token_lists: Vec<Vec<String>> = Vec::new();
    for (level, node) in ctx.definitions.scope_chain().enumerate() {
        if node.include_in_name {
            let tokens = non_blank(node.resolve_tokens(&ctx.blueprint)?);
            if !tokens.is_empty() {
                token_lists.push(tokens);
            }
        }
        expand_level(ctx, level, node, &token_lists, &utm, &mut tcm)?;
    }

    for topic in &ctx.definitions.adhoc_topics {
        register_adhoc(ctx, topic, &utm, &mut tcm)?;
    }

    let utm = utm.build();
    info!(
        "Expansion produced {} topics and {} client mappings",
        tcm.len(),
        utm.len()
    );

    Ok(Expansion { utm, tcm })
}

fn expand_level(
    ctx: &EngineContext,
    level: usize,
    node: &ScopeNode,
    token_lists: &[Vec<String>],
    utm: &UtmBuilder,
    tcm: &mut TopicConfigMapping,
) -> Result<()> {
    let fragments = non_blank(node.topics.names.clone());

    let mut lists = token_lists.to_vec();
    let mut with_wildcard = fragments.clone();
    with_wildcard.push(ctx.wildcard.clone());
    lists.push(with_wildcard);

    let ignored = ignore_pairs(ctx, &node.topics.ignore_scopes, &fragments);

    let properties = ctx.merger.effective(
        &ctx.blueprint,
        node.topics.blueprint.as_deref(),
        &node.topics.overrides,
    )?;

    let mut accepted = 0usize;
    for candidate in permute_joined(&lists, &ctx.separator) {
        if candidate == ctx.wildcard {
            debug!("scope[{}:{}] skipping bare wildcard", level, node.name);
            continue;
        }

        if let Some(pair) = ignored
            .iter()
            .find(|pair| contains_segment(&candidate, pair, &ctx.separator))
        {
            debug!(
                "scope[{}:{}] ignoring {} (matches '{}')",
                level, node.name, candidate, pair
            );
            continue;
        }

        for client in node.clients.iter() {
            utm.register(client, &candidate);
        }

        if !ctx.is_wildcard_topic(&candidate) {
            tcm.insert(candidate, properties.clone());
        }
        accepted += 1;
    }

    debug!("scope[{}:{}] produced {} candidates", level, node.name, accepted);
    Ok(())
}

/// Joined (ignored scope value, topic fragment) pairs. Without fragments the
/// ignored value alone is the forbidden segment.
fn ignore_pairs(ctx: &EngineContext, ignore_scopes: &[String], fragments: &[String]) -> Vec<String> {
    let ignore = non_blank(ignore_scopes.to_vec());
    if ignore.is_empty() {
        return Vec::new();
    }

    let real: Vec<String> = fragments
        .iter()
        .filter(|fragment| **fragment != ctx.wildcard)
        .cloned()
        .collect();

    if real.is_empty() {
        ignore
    } else {
        permute_joined(&[ignore, real], &ctx.separator)
    }
}

/// Whether `pattern` occurs in `name` aligned to separator boundaries, so
/// `int` matches `int.orders` and `dev.int` but not `print.orders`.
fn contains_segment(name: &str, pattern: &str, separator: &str) -> bool {
    if name == pattern {
        return true;
    }
    name.starts_with(&format!("{}{}", pattern, separator))
        || name.ends_with(&format!("{}{}", separator, pattern))
        || name.contains(&format!("{}{}{}", separator, pattern, separator))
}

fn register_adhoc(
    ctx: &EngineContext,
    topic: &AdhocTopic,
    utm: &UtmBuilder,
    tcm: &mut TopicConfigMapping,
) -> Result<()> {
    let properties = ctx
        .merger
        .effective(&ctx.blueprint, topic.blueprint.as_deref(), &topic.overrides)?;

    for name in non_blank(topic.names.clone()) {
        for client in topic.clients.iter() {
            utm.register(client, &name);
        }
        if !ctx.is_wildcard_topic(&name) {
            tcm.insert(name, properties.clone());
        }
    }
    Ok(())
}

fn non_blank(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use crate::acl::AbstractRole;
    use crate::config::EngineConfig;
    use crate::engine::utm::UtmKey;
    use crate::engine::EngineContext;
    use crate::model::{Blueprint, Definitions};
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    const BLUEPRINT: &str = r#"
        [topic_policy]
        defaults = { partitions = 3, "replication.factor" = 3 }

        [[templates]]
        name = "compacted"
        overrides = { "cleanup.policy" = "compact" }

        [enumerations]
        environments = ["int", "bss", "oss"]
    "#;

    const DEFINITIONS: &str = r#"
        [[adhoc_topics]]
        names = ["legacy.audit"]
        blueprint = "compacted"

        [[adhoc_topics.clients.consumers]]
        principal = "auditor"
        group = "audit"

        [scope]
        name = "environment"
        enumeration = "environments"

        [[scope.clients.consumers]]
        principal = "ops"
        group = "ops-readers"

        [scope.child]
        name = "service"

        [scope.child.topics]
        names = ["test2"]
        ignore_scopes = ["bss"]
        overrides = { partitions = 6 }

        [[scope.child.clients.producers]]
        principal = "svc1"
    "#;

    fn context(definitions: &str) -> EngineContext {
        EngineContext::new(
            &EngineConfig::default(),
            Blueprint::from_toml_str(BLUEPRINT).unwrap(),
            Definitions::from_toml_str(definitions).unwrap(),
        )
        .unwrap()
    }

    fn names<'a>(iter: impl Iterator<Item = &'a String>) -> BTreeSet<&'a str> {
        iter.map(|s| s.as_str()).collect()
    }

    #[test]
    fn test_ignore_scopes_exclude_pairs() {
        let ctx = context(DEFINITIONS);
        let expansion = ctx.expand().unwrap();

        let topics = names(expansion.tcm.topic_names());
        assert!(topics.contains("int.test2"));
        assert!(topics.contains("oss.test2"));
        assert!(!topics.contains("bss.test2"));
        assert!(topics.contains("legacy.audit"));
        assert_eq!(topics.len(), 3);
    }

    #[test]
    fn test_wildcards_reach_utm_only() {
        let ctx = context(DEFINITIONS);
        let expansion = ctx.expand().unwrap();

        let ops = UtmKey {
            principal: "ops".to_string(),
            role: AbstractRole::Consumer,
            group: "ops-readers".to_string(),
        };
        let ops_topics = &expansion.utm.get(&ops).unwrap().topics;
        assert_eq!(
            ops_topics.iter().map(|s| s.as_str()).collect::<BTreeSet<_>>(),
            ["bss.*", "int.*", "oss.*"].into()
        );
        assert!(expansion.tcm.iter().all(|(name, _)| !name.ends_with(".*")));

        let svc1 = expansion.utm.topics_for("svc1");
        assert_eq!(
            svc1,
            ["int.test2", "int.*", "oss.test2", "oss.*", "bss.*"].into()
        );
    }

    #[test]
    fn test_effective_configs() {
        let ctx = context(DEFINITIONS);
        let expansion = ctx.expand().unwrap();

        let int = expansion.tcm.get("int.test2").unwrap();
        assert_eq!(int.get("partitions").unwrap(), "6");
        assert_eq!(int.get("replication.factor").unwrap(), "3");

        let audit = expansion.tcm.get("legacy.audit").unwrap();
        assert_eq!(audit.get("cleanup.policy").unwrap(), "compact");
        assert_eq!(audit.get("partitions").unwrap(), "3");
    }

    #[test]
    fn test_expansion_is_deterministic() {
        let first = context(DEFINITIONS).expand().unwrap();
        let second = context(DEFINITIONS).expand().unwrap();
        assert_eq!(first.utm, second.utm);
        assert_eq!(first.tcm, second.tcm);
    }

    #[test]
    fn test_node_without_tokens_attaches_per_ancestor_combination() {
        let definitions = r#"
            [scope]
            name = "environment"
            values = ["int", "prd"]

            [scope.child]
            name = "stage"
            include_in_name = false
            values = ["blue", "green"]

            [scope.child.topics]
            names = ["events"]

            [[scope.child.clients.consumers]]
            principal = "reader"
        "#;
        let expansion = context(definitions).expand().unwrap();

        assert_eq!(
            names(expansion.tcm.topic_names()),
            ["int.events", "prd.events"].into()
        );
        assert_eq!(
            expansion.utm.topics_for("reader"),
            ["int.events", "int.*", "prd.events", "prd.*"].into()
        );
    }

    #[test]
    fn test_root_without_tokens_skips_bare_wildcard() {
        let definitions = r#"
            [scope]
            name = "global"

            [scope.topics]
            names = ["heartbeat"]

            [[scope.clients.consumers]]
            principal = "monitor"
        "#;
        let expansion = context(definitions).expand().unwrap();
        assert_eq!(names(expansion.tcm.topic_names()), ["heartbeat"].into());
        assert_eq!(expansion.utm.topics_for("monitor"), ["heartbeat"].into());
    }

    #[test]
    fn test_ignore_without_fragments_drops_prefix() {
        let definitions = r#"
            [scope]
            name = "environment"
            values = ["int", "bss"]

            [scope.topics]
            ignore_scopes = ["bss"]

            [[scope.clients.consumers]]
            principal = "ops"
        "#;
        let expansion = context(definitions).expand().unwrap();
        assert!(expansion.tcm.is_empty());
        assert_eq!(expansion.utm.topics_for("ops"), ["int.*"].into());
    }

    #[test]
    fn test_ignore_matches_whole_segments_only() {
        let definitions = r#"
            [scope]
            name = "environment"
            values = ["int", "print"]

            [scope.topics]
            ignore_scopes = ["int"]

            [[scope.clients.consumers]]
            principal = "ops"

            [scope.child]
            name = "service"

            [scope.child.topics]
            names = ["int", "points"]
            ignore_scopes = ["print"]
        "#;
        let expansion = context(definitions).expand().unwrap();

        assert_eq!(expansion.utm.topics_for("ops"), ["print.*"].into());
        assert_eq!(
            names(expansion.tcm.topic_names()),
            ["int.int", "int.points"].into()
        );
    }

    #[test]
    fn test_contains_segment() {
        assert!(super::contains_segment("int", "int", "."));
        assert!(super::contains_segment("int.orders", "int", "."));
        assert!(super::contains_segment("eu.int.orders", "int", "."));
        assert!(super::contains_segment("eu.int", "int", "."));
        assert!(super::contains_segment("bss.test2.v1", "bss.test2", "."));
        assert!(!super::contains_segment("print.*", "int", "."));
        assert!(!super::contains_segment("int_x.orders", "int", "."));
        assert!(!super::contains_segment("xbss.test2", "bss.test2", "."));
    }
}
