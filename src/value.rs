//
// Copyright (c) The yangtree Core Contributors
//
// SPDX-License-Identifier: MIT
//

//! Lexical value decoding against resolved type derivation chains.
//!
//! `decode_value` turns a lexical value into a typed [`DataValue`] and
//! its canonical string form, enforcing every restriction along the
//! derivation chain. Leafref and instance-identifier values are
//! accepted here and flagged for the data-level resolution queue.

use num_traits::checked_pow;
use regex::Regex;

use crate::context::Context;
use crate::error::{Error, ErrorCode, Result};
use crate::ident::{self, split_prefix};
use crate::resolver;
use crate::schema::{DataValue, DataValueType, ModuleId, TypeId};

/// Outcome of decoding a lexical value.
#[derive(Debug)]
pub(crate) struct DecodeResult {
    pub value: DataValue,
    pub canonical: String,
    /// The value is a leafref or instance-identifier and its target
    /// instance must be located once the data tree is complete.
    pub needs_instance: bool,
}

impl DecodeResult {
    fn plain(value: DataValue, canonical: String) -> DecodeResult {
        DecodeResult {
            value,
            canonical,
            needs_instance: false,
        }
    }
}

/// Decode `value` against the resolved type `tid`. Prefixes inside
/// identityref and instance-identifier values are resolved through the
/// `prefixes` mapping (XML prefixes for data input, import prefixes
/// for schema defaults); unprefixed identityrefs fall back to
/// `default_module`.
pub(crate) fn decode_value(
    ctx: &Context,
    tid: TypeId,
    value: &str,
    default_module: ModuleId,
    prefixes: &dyn Fn(&str) -> Option<ModuleId>,
) -> Result<DecodeResult> {
    use DataValueType::*;

    let base = ctx.type_data(tid).base;
    match base {
        Int8 | Int16 | Int32 | Int64 | Uint8 | Uint16 | Uint32 | Uint64 => {
            decode_integer(ctx, tid, base, value)
        }
        Bool => match value.trim() {
            "true" => Ok(DecodeResult::plain(
                DataValue::Bool(true),
                "true".to_string(),
            )),
            "false" => Ok(DecodeResult::plain(
                DataValue::Bool(false),
                "false".to_string(),
            )),
            other => Err(invalid_value(other, "boolean")),
        },
        Empty => {
            if value.trim().is_empty() {
                Ok(DecodeResult::plain(DataValue::Empty, std::string::String::new()))
            } else {
                Err(invalid_value(value, "empty"))
            }
        }
        String => decode_string(ctx, tid, value),
        Binary => decode_binary(ctx, tid, value),
        Dec64 => decode_dec64(ctx, tid, value),
        Enum => decode_enum(ctx, tid, value),
        Bits => decode_bits(ctx, tid, value),
        IdentityRef => {
            decode_identityref(ctx, tid, value, default_module, prefixes)
        }
        InstanceId => decode_instanceid(ctx, value, prefixes),
        LeafRef => {
            let target =
                resolver::leafref_chain_target(ctx, tid).ok_or_else(|| {
                    Error::new(
                        ErrorCode::Int,
                        "Unresolved leafref target type",
                    )
                })?;
            let mut result = decode_value(
                ctx,
                target,
                value,
                default_module,
                prefixes,
            )?;
            result.needs_instance = true;
            Ok(result)
        }
        Union => {
            let members = resolver::effective_union_types(ctx, tid)
                .cloned()
                .unwrap_or_default();
            // The first member that accepts the value wins; member
            // order is significant.
            for member in members {
                if let Ok(result) = decode_value(
                    ctx,
                    member,
                    value,
                    default_module,
                    prefixes,
                ) {
                    return Ok(result);
                }
            }
            Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Value \"{}\" does not match any member of the union",
                    value
                ),
            ))
        }
        Unknown => Err(Error::new(
            ErrorCode::Int,
            "Value decoded against an unresolved type",
        )),
    }
}

/// Decode against a type using the import prefixes of `module` (schema
/// default values).
pub(crate) fn decode_with_type(
    ctx: &Context,
    tid: TypeId,
    value: &str,
    module: ModuleId,
) -> Result<DecodeResult> {
    decode_value(ctx, tid, value, module, &|prefix| {
        ctx.resolve_prefix(module, prefix)
    })
}

// ===== numeric types =====

/// Natural bounds of a numeric base type. Decimal64 bounds are in the
/// scaled (10^fraction-digits) representation.
pub(crate) fn base_range_bounds(
    base: DataValueType,
    _frac_digits: Option<u8>,
) -> (i128, i128) {
    use DataValueType::*;
    match base {
        Int8 => (i8::MIN as i128, i8::MAX as i128),
        Int16 => (i16::MIN as i128, i16::MAX as i128),
        Int32 => (i32::MIN as i128, i32::MAX as i128),
        Int64 => (i64::MIN as i128, i64::MAX as i128),
        Uint8 => (0, u8::MAX as i128),
        Uint16 => (0, u16::MAX as i128),
        Uint32 => (0, u32::MAX as i128),
        Uint64 => (0, u64::MAX as i128),
        Dec64 => (i64::MIN as i128, i64::MAX as i128),
        _ => (i128::MIN, i128::MAX),
    }
}

/// Parse a range-statement bound for the given base.
pub(crate) fn parse_range_value(
    base: DataValueType,
    frac_digits: Option<u8>,
    value: &str,
) -> Result<i128> {
    match base {
        DataValueType::Dec64 => {
            parse_dec64_lexical(value, frac_digits.unwrap_or(1))
        }
        _ => value.trim().parse::<i128>().map_err(|_| {
            Error::new(
                ErrorCode::Inval,
                format!("Invalid range value \"{}\"", value),
            )
        }),
    }
}

fn in_intervals(value: i128, intervals: &[(i128, i128)]) -> bool {
    intervals.iter().any(|&(lo, hi)| value >= lo && value <= hi)
}

fn decode_integer(
    ctx: &Context,
    tid: TypeId,
    base: DataValueType,
    value: &str,
) -> Result<DecodeResult> {
    let trimmed = value.trim();
    let parsed = trimmed.parse::<i128>().map_err(|_| {
        invalid_value(value, base.name())
    })?;

    let bounds = base_range_bounds(base, None);
    if parsed < bounds.0 || parsed > bounds.1 {
        return Err(out_of_range(value, base.name()));
    }
    if let Some(range) = resolver::effective_range(ctx, tid) {
        if !in_intervals(parsed, range) {
            return Err(out_of_range(value, base.name()));
        }
    }

    let canonical = parsed.to_string();
    let value = match base {
        DataValueType::Int8 => DataValue::Int8(parsed as i8),
        DataValueType::Int16 => DataValue::Int16(parsed as i16),
        DataValueType::Int32 => DataValue::Int32(parsed as i32),
        DataValueType::Int64 => DataValue::Int64(parsed as i64),
        DataValueType::Uint8 => DataValue::Uint8(parsed as u8),
        DataValueType::Uint16 => DataValue::Uint16(parsed as u16),
        DataValueType::Uint32 => DataValue::Uint32(parsed as u32),
        DataValueType::Uint64 => DataValue::Uint64(parsed as u64),
        _ => unreachable!(),
    };
    Ok(DecodeResult::plain(value, canonical))
}

/// Parse a decimal64 lexical value into its scaled 64-bit
/// representation (value * 10^fraction-digits).
pub(crate) fn parse_dec64_lexical(value: &str, frac_digits: u8) -> Result<i128> {
    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (int_part, frac_part) = match digits.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (digits, ""),
    };
    if int_part.is_empty()
        || !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid_value(value, "decimal64"));
    }
    if frac_part.len() > frac_digits as usize {
        return Err(out_of_range(value, "decimal64"));
    }

    let scale = checked_pow(10i128, frac_digits as usize)
        .ok_or_else(|| out_of_range(value, "decimal64"))?;
    let int_part = int_part
        .parse::<i128>()
        .map_err(|_| out_of_range(value, "decimal64"))?;
    let frac_scale = checked_pow(10i128, frac_digits as usize - frac_part.len())
        .ok_or_else(|| out_of_range(value, "decimal64"))?;
    let frac_part = if frac_part.is_empty() {
        0
    } else {
        frac_part
            .parse::<i128>()
            .map_err(|_| out_of_range(value, "decimal64"))?
    };

    let scaled = int_part
        .checked_mul(scale)
        .and_then(|v| v.checked_add(frac_part * frac_scale))
        .ok_or_else(|| out_of_range(value, "decimal64"))?;
    let scaled = if negative { -scaled } else { scaled };

    if scaled < i64::MIN as i128 || scaled > i64::MAX as i128 {
        return Err(out_of_range(value, "decimal64"));
    }
    Ok(scaled)
}

/// Canonical form of a scaled decimal64 value: minimal digits with at
/// least one fractional digit.
pub(crate) fn format_dec64(scaled: i128, frac_digits: u8) -> String {
    let scale = 10i128.pow(frac_digits as u32);
    let negative = scaled < 0;
    let abs = scaled.unsigned_abs();
    let int_part = abs / scale.unsigned_abs();
    let mut frac = format!(
        "{:0width$}",
        abs % scale.unsigned_abs(),
        width = frac_digits as usize
    );
    while frac.len() > 1 && frac.ends_with('0') {
        frac.pop();
    }
    format!(
        "{}{}.{}",
        if negative { "-" } else { "" },
        int_part,
        frac
    )
}

fn decode_dec64(
    ctx: &Context,
    tid: TypeId,
    value: &str,
) -> Result<DecodeResult> {
    let frac_digits = resolver::effective_frac_digits(ctx, tid)
        .ok_or_else(|| {
            Error::new(ErrorCode::Int, "decimal64 without fraction-digits")
        })?;
    let scaled = parse_dec64_lexical(value, frac_digits)?;
    if let Some(range) = resolver::effective_range(ctx, tid) {
        if !in_intervals(scaled, range) {
            return Err(out_of_range(value, "decimal64"));
        }
    }
    let canonical = format_dec64(scaled, frac_digits);
    Ok(DecodeResult::plain(
        DataValue::Other(canonical.clone()),
        canonical,
    ))
}

// ===== string and binary =====

fn decode_string(
    ctx: &Context,
    tid: TypeId,
    value: &str,
) -> Result<DecodeResult> {
    if let Some(length) = resolver::effective_length(ctx, tid) {
        let chars = value.chars().count() as u64;
        if !length.iter().any(|&(lo, hi)| chars >= lo && chars <= hi) {
            return Err(out_of_range(value, "string"));
        }
    }
    // Every pattern along the derivation chain applies, ancestor-most
    // first.
    for pattern in resolver::collect_patterns(ctx, tid) {
        if !pattern.is_match(value) {
            return Err(Error::new(
                ErrorCode::Inval,
                format!(
                    "Value \"{}\" does not match pattern \"{}\"",
                    value,
                    pattern.as_str()
                ),
            ));
        }
    }
    Ok(DecodeResult::plain(
        DataValue::Other(value.to_string()),
        value.to_string(),
    ))
}

/// Compile a YANG pattern. Patterns are implicitly anchored: an
/// explicit anchor is added unless the expression already begins/ends
/// with `.*`.
pub(crate) fn compile_pattern(expr: &str) -> Result<Regex> {
    let anchored = match (expr.starts_with(".*"), expr.ends_with(".*")) {
        (true, true) => expr.to_string(),
        (true, false) => format!("(?:{})$", expr),
        (false, true) => format!("^(?:{})", expr),
        (false, false) => format!("^(?:{})$", expr),
    };
    Regex::new(&anchored).map_err(|err| {
        Error::new(
            ErrorCode::Inval,
            format!("Invalid pattern \"{}\": {}", expr, err),
        )
    })
}

fn decode_binary(
    ctx: &Context,
    tid: TypeId,
    value: &str,
) -> Result<DecodeResult> {
    let stripped: String =
        value.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let decoded_len = base64_decoded_len(&stripped)
        .ok_or_else(|| invalid_value(value, "binary"))?;
    if let Some(length) = resolver::effective_length(ctx, tid) {
        if !length
            .iter()
            .any(|&(lo, hi)| decoded_len >= lo && decoded_len <= hi)
        {
            return Err(out_of_range(value, "binary"));
        }
    }
    Ok(DecodeResult::plain(
        DataValue::Other(stripped.clone()),
        stripped,
    ))
}

/// Byte length of the payload encoded by a base64 string, or None if
/// the string is not valid base64.
fn base64_decoded_len(encoded: &str) -> Option<u64> {
    if encoded.is_empty() {
        return Some(0);
    }
    if encoded.len() % 4 != 0 {
        return None;
    }
    let padding = encoded.bytes().rev().take_while(|&b| b == b'=').count();
    if padding > 2 {
        return None;
    }
    let body = &encoded[..encoded.len() - padding];
    if !body.bytes().all(|b| {
        b.is_ascii_alphanumeric() || b == b'+' || b == b'/'
    }) {
        return None;
    }
    Some((encoded.len() as u64 / 4) * 3 - padding as u64)
}

// ===== enumeration and bits =====

fn decode_enum(
    ctx: &Context,
    tid: TypeId,
    value: &str,
) -> Result<DecodeResult> {
    let trimmed = value.trim();
    let enums = resolver::effective_enums(ctx, tid).ok_or_else(|| {
        Error::new(ErrorCode::Int, "Enumeration without members")
    })?;
    match enums.iter().find(|member| member.name.as_ref() == trimmed) {
        Some(member) => Ok(DecodeResult::plain(
            DataValue::Other(member.name.to_string()),
            member.name.to_string(),
        )),
        None => Err(invalid_value(value, "enumeration")),
    }
}

fn decode_bits(
    ctx: &Context,
    tid: TypeId,
    value: &str,
) -> Result<DecodeResult> {
    let bits = resolver::effective_bits(ctx, tid).ok_or_else(|| {
        Error::new(ErrorCode::Int, "Bits type without members")
    })?;
    let mut selected: Vec<&crate::schema::TypeBit> = Vec::new();
    for token in value.split_whitespace() {
        let bit = bits
            .iter()
            .find(|bit| bit.name.as_ref() == token)
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::Inval,
                    format!("Unknown bit \"{}\"", token),
                )
            })?;
        if selected.iter().any(|other| other.pos == bit.pos) {
            return Err(Error::new(
                ErrorCode::Inval,
                format!("Duplicated bit \"{}\"", token),
            ));
        }
        selected.push(bit);
    }
    // Canonical order follows the bit positions.
    selected.sort_by_key(|bit| bit.pos);
    let canonical = selected
        .iter()
        .map(|bit| bit.name.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    Ok(DecodeResult::plain(
        DataValue::Other(canonical.clone()),
        canonical,
    ))
}

// ===== identityref and instance-identifier =====

fn decode_identityref(
    ctx: &Context,
    tid: TypeId,
    value: &str,
    default_module: ModuleId,
    prefixes: &dyn Fn(&str) -> Option<ModuleId>,
) -> Result<DecodeResult> {
    let trimmed = value.trim();
    let (prefix, name) = split_prefix(trimmed);
    let module = match prefix {
        Some(prefix) => prefixes(prefix).ok_or_else(|| {
            Error::new(
                ErrorCode::Inmod,
                format!("Unknown prefix \"{}\"", prefix),
            )
        })?,
        None => default_module,
    };

    let candidate = ctx
        .module_data(module)
        .identities
        .iter()
        .copied()
        .find(|&ident| ctx.ident_data(ident).name.as_ref() == name)
        .ok_or_else(|| invalid_value(value, "identityref"))?;

    let base = resolver::effective_ident_base(ctx, tid).ok_or_else(|| {
        Error::new(ErrorCode::Int, "identityref without a base identity")
    })?;
    if !resolver::identity_derived_from(ctx, candidate, base) {
        return Err(Error::new(
            ErrorCode::Inval,
            format!(
                "Identity \"{}\" is not derived from the base of the identityref",
                trimmed
            ),
        ));
    }

    let canonical = format!(
        "{}:{}",
        ctx.module_data(ctx.ident_data(candidate).module).name,
        name
    );
    Ok(DecodeResult::plain(
        DataValue::Other(canonical.clone()),
        canonical,
    ))
}

fn decode_instanceid(
    ctx: &Context,
    value: &str,
    prefixes: &dyn Fn(&str) -> Option<ModuleId>,
) -> Result<DecodeResult> {
    let steps = ident::parse_instance_identifier(value.trim())?;

    // Canonicalize: prefixes become module names, unprefixed steps
    // inherit the previous step's module.
    let mut canonical = String::new();
    let mut prev_module: Option<ModuleId> = None;
    for step in &steps {
        let module = match &step.node.0 {
            Some(prefix) => prefixes(prefix)
                .or_else(|| ctx.module_latest(prefix))
                .ok_or_else(|| {
                    Error::new(
                        ErrorCode::Inmod,
                        format!("Unknown prefix \"{}\"", prefix),
                    )
                })?,
            None => prev_module.ok_or_else(|| {
                Error::new(
                    ErrorCode::Inval,
                    "First node of an instance-identifier must be prefixed",
                )
            })?,
        };
        canonical.push('/');
        if prev_module != Some(module) {
            canonical.push_str(&ctx.module_data(module).name);
            canonical.push(':');
        }
        canonical.push_str(&step.node.1);
        for pred in &step.preds {
            match pred {
                ident::InstidPred::Key((_, key), value) => {
                    canonical
                        .push_str(&format!("[{}='{}']", key, value));
                }
                ident::InstidPred::Value(value) => {
                    canonical.push_str(&format!("[.='{}']", value));
                }
                ident::InstidPred::Position(pos) => {
                    canonical.push_str(&format!("[{}]", pos));
                }
            }
        }
        prev_module = Some(module);
    }

    Ok(DecodeResult {
        value: DataValue::Other(canonical.clone()),
        canonical,
        needs_instance: true,
    })
}

// ===== error helpers =====

fn invalid_value(value: &str, type_name: &str) -> Error {
    Error::new(
        ErrorCode::Inval,
        format!("Invalid {} value \"{}\"", type_name, value),
    )
}

fn out_of_range(value: &str, type_name: &str) -> Error {
    Error::new(
        ErrorCode::Oorval,
        format!("Value \"{}\" is out of range for type {}", value, type_name),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dec64_lexical() {
        assert_eq!(parse_dec64_lexical("3.14", 2).unwrap(), 314);
        assert_eq!(parse_dec64_lexical("-1", 1).unwrap(), -10);
        assert_eq!(parse_dec64_lexical("0.5", 3).unwrap(), 500);
        assert!(parse_dec64_lexical("1.234", 2).is_err());
        assert!(parse_dec64_lexical("abc", 2).is_err());
        // 2^63 scaled overflows.
        assert!(parse_dec64_lexical("922337203685477580.8", 1).is_err());
    }

    #[test]
    fn dec64_canonical() {
        assert_eq!(format_dec64(314, 2), "3.14");
        assert_eq!(format_dec64(-10, 1), "-1.0");
        assert_eq!(format_dec64(500, 3), "0.5");
        assert_eq!(format_dec64(0, 5), "0.0");
    }

    #[test]
    fn base64_lengths() {
        assert_eq!(base64_decoded_len(""), Some(0));
        assert_eq!(base64_decoded_len("AA=="), Some(1));
        assert_eq!(base64_decoded_len("AAA="), Some(2));
        assert_eq!(base64_decoded_len("AAAA"), Some(3));
        assert_eq!(base64_decoded_len("AAAAAA=="), Some(4));
        assert_eq!(base64_decoded_len("AAA"), None);
        assert_eq!(base64_decoded_len("A!=="), None);
    }

    #[test]
    fn pattern_anchoring() {
        // A pattern matching only a prefix of the value must fail.
        let re = compile_pattern("[a-z]+").unwrap();
        assert!(re.is_match("abc"));
        assert!(!re.is_match("abc1"));
        assert!(!re.is_match("1abc"));

        let re = compile_pattern(".*foo").unwrap();
        assert!(re.is_match("barfoo"));
        assert!(!re.is_match("barfoobaz"));
    }
}
