//! Parsing of rendered address strings.
//!
//! The grammar mirrors the renderings in the sibling modules: dotted
//! identifier segments, optional `[index]` or `["key"]` instance keys,
//! and an optional trailing `#destroy` phase qualifier on resource
//! instances.

use crate::error::{ParseError, Result};
use crate::module::{ModuleCall, ModuleCallInstance, ModuleInstance, ModuleInstanceStep};
use crate::resource::{InstanceKey, Resource, ResourceMode, ResourcePhase};
use crate::target::{Address, InputVariable, LocalValue, OutputValue, Referenceable};

#[derive(Debug)]
struct Segment {
    ident: String,
    key: Option<InstanceKey>,
}

/// Parse a reference-target address.
pub fn parse_referenceable(input: &str) -> Result<Referenceable> {
    match parse_address(input)? {
        Address::Module(_) => Err(ParseError::Malformed {
            input: input.to_string(),
            message: "a module instance path cannot be a reference subject".to_string(),
        }),
        Address::Resource(a) => Ok(Referenceable::Resource(a)),
        Address::ResourceInstance(a) => Ok(Referenceable::ResourceInstance(a)),
        Address::ResourceInstancePhase(a) => Ok(Referenceable::ResourceInstancePhase(a)),
        Address::InputVariable(a) => Ok(Referenceable::InputVariable(a)),
        Address::LocalValue(a) => Ok(Referenceable::LocalValue(a)),
        Address::OutputValue(a) => Ok(Referenceable::OutputValue(a)),
        Address::ModuleCall(a) => Ok(Referenceable::ModuleCall(a)),
        Address::ModuleCallInstance(a) => Ok(Referenceable::ModuleCallInstance(a)),
    }
}

/// Parse any address, including module instance paths.
pub fn parse_address(input: &str) -> Result<Address> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::Empty);
    }

    let (body, phase) = split_phase(trimmed, input)?;
    let segments = split_segments(body, input)?;

    let addr = match segments[0].ident.as_str() {
        "var" => Address::InputVariable(InputVariable {
            name: single_name(&segments, input)?,
        }),
        "local" => Address::LocalValue(LocalValue {
            name: single_name(&segments, input)?,
        }),
        "output" => Address::OutputValue(OutputValue {
            name: single_name(&segments, input)?,
        }),
        "module" => parse_module(&segments, input)?,
        "data" => {
            if segments.len() != 3 || segments[0].key.is_some() || segments[1].key.is_some() {
                return Err(ParseError::Malformed {
                    input: input.to_string(),
                    message: "data source address must be data.TYPE.NAME".to_string(),
                });
            }
            resource_address(
                Resource {
                    mode: ResourceMode::Data,
                    type_name: segments[1].ident.clone(),
                    name: segments[2].ident.clone(),
                },
                segments[2].key.clone(),
            )
        }
        _ => {
            if segments.len() != 2 || segments[0].key.is_some() {
                return Err(ParseError::Malformed {
                    input: input.to_string(),
                    message: "resource address must be TYPE.NAME".to_string(),
                });
            }
            resource_address(
                Resource {
                    mode: ResourceMode::Managed,
                    type_name: segments[0].ident.clone(),
                    name: segments[1].ident.clone(),
                },
                segments[1].key.clone(),
            )
        }
    };

    match phase {
        None => Ok(addr),
        Some(p) => match addr {
            Address::Resource(r) => {
                Ok(Address::ResourceInstancePhase(r.instance(None).phase(p)))
            }
            Address::ResourceInstance(inst) => {
                Ok(Address::ResourceInstancePhase(inst.phase(p)))
            }
            _ => Err(ParseError::Malformed {
                input: input.to_string(),
                message: "phase qualifier is only valid on resource instances".to_string(),
            }),
        },
    }
}

fn resource_address(resource: Resource, key: Option<InstanceKey>) -> Address {
    match key {
        None => Address::Resource(resource),
        Some(k) => Address::ResourceInstance(resource.instance(Some(k))),
    }
}

fn parse_module(segments: &[Segment], input: &str) -> Result<Address> {
    // Segments alternate "module" / NAME, so the count must be even.
    if segments.len() % 2 != 0 {
        return Err(ParseError::Malformed {
            input: input.to_string(),
            message: "module address must be module.NAME pairs".to_string(),
        });
    }
    let mut steps = Vec::with_capacity(segments.len() / 2);
    for pair in segments.chunks(2) {
        if pair[0].ident != "module" || pair[0].key.is_some() {
            return Err(ParseError::Malformed {
                input: input.to_string(),
                message: "module address must be module.NAME pairs".to_string(),
            });
        }
        steps.push(ModuleInstanceStep {
            name: pair[1].ident.clone(),
            key: pair[1].key.clone(),
        });
    }

    if steps.len() == 1 {
        let step = steps.into_iter().next().unwrap();
        return Ok(match step.key {
            None => Address::ModuleCall(ModuleCall { name: step.name }),
            key @ Some(_) => Address::ModuleCallInstance(ModuleCallInstance {
                name: step.name,
                key,
            }),
        });
    }
    Ok(Address::Module(ModuleInstance::from_steps(steps)))
}

fn single_name(segments: &[Segment], input: &str) -> Result<String> {
    if segments.len() != 2 || segments[1].key.is_some() {
        return Err(ParseError::Malformed {
            input: input.to_string(),
            message: format!("{} address takes exactly one name", segments[0].ident),
        });
    }
    Ok(segments[1].ident.clone())
}

fn split_phase<'a>(body: &'a str, input: &str) -> Result<(&'a str, Option<ResourcePhase>)> {
    match body.rsplit_once('#') {
        None => Ok((body, None)),
        Some((head, "destroy")) => Ok((head, Some(ResourcePhase::Destroy))),
        Some((_, phase)) => Err(ParseError::UnknownPhase {
            phase: phase.to_string(),
            input: input.to_string(),
        }),
    }
}

fn split_segments(body: &str, input: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for raw in split_dots(body) {
        segments.push(parse_segment(raw, input)?);
    }
    if segments.is_empty() {
        return Err(ParseError::Empty);
    }
    Ok(segments)
}

/// Split on `.` outside of brackets and quotes.
fn split_dots(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_str = false;
    let mut start = 0usize;
    for (i, c) in body.char_indices() {
        match c {
            '"' => in_str = !in_str,
            '[' if !in_str => depth += 1,
            ']' if !in_str => depth = depth.saturating_sub(1),
            '.' if !in_str && depth == 0 => {
                parts.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn parse_segment(raw: &str, input: &str) -> Result<Segment> {
    let (ident, key) = match raw.find('[') {
        None => (raw, None),
        Some(open) => {
            if !raw.ends_with(']') {
                return Err(ParseError::InvalidKey {
                    input: input.to_string(),
                    message: "unterminated instance key".to_string(),
                });
            }
            (&raw[..open], Some(parse_key(&raw[open + 1..raw.len() - 1], input)?))
        }
    };

    if !is_identifier(ident) {
        return Err(ParseError::InvalidIdentifier {
            ident: ident.to_string(),
            input: input.to_string(),
        });
    }

    Ok(Segment {
        ident: ident.to_string(),
        key,
    })
}

fn parse_key(raw: &str, input: &str) -> Result<InstanceKey> {
    if let Some(stripped) = raw.strip_prefix('"') {
        let Some(name) = stripped.strip_suffix('"') else {
            return Err(ParseError::InvalidKey {
                input: input.to_string(),
                message: "unterminated string key".to_string(),
            });
        };
        if name.contains('"') {
            return Err(ParseError::InvalidKey {
                input: input.to_string(),
                message: "string key may not contain quotes".to_string(),
            });
        }
        return Ok(InstanceKey::Str(name.to_string()));
    }
    raw.parse::<u64>()
        .map(InstanceKey::Index)
        .map_err(|_| ParseError::InvalidKey {
            input: input.to_string(),
            message: format!("{raw:?} is neither an index nor a quoted name"),
        })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
