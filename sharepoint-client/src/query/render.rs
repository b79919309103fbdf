//! Protocol-specific query string rendering
//!
//! Turns a [`Query`] into the `$select`/`$filter`/`$orderby`/`$top`/`$skip`
//! option string for one of the two OData dialects, translating logical field
//! names through the metadata registry and applying the per-dialect literal
//! encodings and capability rules.

use log::warn;

use super::filters::{ComparisonOperator, Filter, FilterValue};
use super::orderby::SortDirection;
use super::query::Query;
use crate::error::BuildError;
use crate::metadata::EntityMetadataRegistry;
use crate::protocol::Protocol;

/// Render a query into a protocol-correct option string (no leading `?`).
/// Returns an empty string when nothing would be emitted.
pub fn render(
    query: &Query,
    model: &str,
    protocol: Protocol,
    registry: &EntityMetadataRegistry,
) -> Result<String, BuildError> {
    if !protocol.is_odata() {
        return Err(BuildError::Serialization(
            "the CSOM protocol has no OData query surface".to_string(),
        ));
    }

    let mut options: Vec<(&str, String)> = Vec::new();

    if !query.select.is_empty() {
        let fields = query
            .select
            .iter()
            .map(|f| field_name(model, f, protocol, registry, query.strict_fields))
            .collect::<Result<Vec<_>, _>>()?;
        options.push(("$select", fields.join(",")));
    }

    let filter = render_filters(query, model, protocol, registry)?;
    let has_filter = !filter.is_empty();
    if has_filter {
        options.push(("$filter", filter));
    }

    if !query.order_by.is_empty() {
        options.push((
            "$orderby",
            render_order_by(query, model, protocol, registry)?,
        ));
    }

    // One dialect forbids combining $top/$skip with $filter; the options are
    // suppressed rather than producing a request the server would reject.
    let paging_allowed = !has_filter || protocol.supports_top_with_filter();
    if paging_allowed {
        if let Some(top) = query.top {
            options.push(("$top", top.to_string()));
        }
        if let Some(skip) = query.skip {
            options.push(("$skip", skip.to_string()));
        }
    } else if query.top.is_some() || query.skip.is_some() {
        warn!(
            "dropping $top/$skip: the {} dialect does not allow them together with $filter",
            protocol.label()
        );
    }

    Ok(options
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, value))
        .collect::<Vec<_>>()
        .join("&"))
}

/// Structural separator between tokens: percent-encoded space for the
/// encoded dialect, literal space otherwise.
fn separator(protocol: Protocol) -> &'static str {
    if protocol.encodes_query_spaces() {
        "%20"
    } else {
        " "
    }
}

/// Field-name lookup honoring the query's strictness: strict resolution
/// surfaces unknown fields as errors, the default falls back to the logical
/// name unchanged.
fn field_name<'a>(
    model: &str,
    logical_name: &'a str,
    protocol: Protocol,
    registry: &'a EntityMetadataRegistry,
    strict: bool,
) -> Result<&'a str, BuildError> {
    if strict {
        let resolved = registry.resolve_strict(model, logical_name)?;
        Ok(match protocol {
            Protocol::Graph => resolved.graph_name,
            Protocol::Rest | Protocol::Csom => resolved.rest_name,
        })
    } else {
        Ok(registry.field_name(model, logical_name, protocol))
    }
}

fn render_filters(
    query: &Query,
    model: &str,
    protocol: Protocol,
    registry: &EntityMetadataRegistry,
) -> Result<String, BuildError> {
    let sep = separator(protocol);
    let mut rendered = String::new();

    for item in &query.filters {
        if item.filter.is_empty() {
            continue;
        }
        let fragment =
            render_filter(&item.filter, model, protocol, registry, query.strict_fields)?;
        if rendered.is_empty() {
            rendered = fragment;
        } else {
            rendered = format!(
                "{}{}{}{}{}",
                rendered,
                sep,
                item.concat.token(),
                sep,
                fragment
            );
        }
    }

    Ok(rendered)
}

/// Join `"<field>[ desc]"` entries with commas; no trailing comma, empty
/// list renders to nothing (the caller elides the option).
fn render_order_by(
    query: &Query,
    model: &str,
    protocol: Protocol,
    registry: &EntityMetadataRegistry,
) -> Result<String, BuildError> {
    let sep = separator(protocol);
    let entries = query
        .order_by
        .iter()
        .map(|entry| {
            let name =
                field_name(model, &entry.field, protocol, registry, query.strict_fields)?;
            Ok(match entry.direction {
                SortDirection::Ascending => name.to_string(),
                SortDirection::Descending => format!("{}{}desc", name, sep),
            })
        })
        .collect::<Result<Vec<_>, BuildError>>()?;
    Ok(entries.join(","))
}

fn render_filter(
    filter: &Filter,
    model: &str,
    protocol: Protocol,
    registry: &EntityMetadataRegistry,
    strict: bool,
) -> Result<String, BuildError> {
    match filter {
        Filter::Comparison {
            field,
            operator,
            value,
        } => {
            if *operator == ComparisonOperator::Not {
                return Err(BuildError::UnsupportedOperator {
                    operator: operator.token().to_string(),
                    dialect: protocol.label().to_string(),
                });
            }
            let sep = separator(protocol);
            Ok(format!(
                "{}{}{}{}{}",
                field_name(model, field, protocol, registry, strict)?,
                sep,
                operator.token(),
                sep,
                render_value(value, protocol)?
            ))
        }
        Filter::Group { concat, children } => {
            let sep = separator(protocol);
            let mut parts = Vec::new();
            for child in children {
                if child.is_empty() {
                    continue;
                }
                parts.push(render_filter(child, model, protocol, registry, strict)?);
            }
            // Empty groups were elided by the caller; defensively render to
            // nothing anyway.
            if parts.is_empty() {
                return Ok(String::new());
            }
            let joiner = format!("{}{}{}", sep, concat.token(), sep);
            Ok(format!("({})", parts.join(&joiner)))
        }
    }
}

/// Literal rendering is protocol- and type-sensitive.
fn render_value(value: &FilterValue, protocol: Protocol) -> Result<String, BuildError> {
    match value {
        FilterValue::String(s) => Ok(format!("'{}'", s.replace('\'', "''"))),
        FilterValue::Int(i) => Ok(i.to_string()),
        FilterValue::Double(d) => Ok(d.to_string()),
        FilterValue::Bool(b) => Ok(b.to_string()),
        FilterValue::Guid(g) => Ok(match protocol {
            Protocol::Rest => format!("(guid'{}')", g),
            _ => g.to_string(),
        }),
        FilterValue::DateTime(dt) => {
            let iso = dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            Ok(match protocol {
                Protocol::Rest => format!("datetime'{}'", iso),
                _ => iso,
            })
        }
        FilterValue::Null => Err(BuildError::UnsupportedValueType {
            kind: value.kind().to_string(),
            dialect: protocol.label().to_string(),
        }),
    }
}
