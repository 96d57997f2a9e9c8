//! Declared-type ABI encoding and decoding for EVM function calls.
//!
//! Types are always declared up front (parsed from a human-readable signature
//! such as `"balanceOf(address) returns (uint256)"`), never inferred from the
//! values. Decoding is strict: a payload whose layout does not match the
//! declared types is a [`EthError::DecodingError`], never a silent default.

use std::fmt;

use alloy_primitives::{Address, I256, U256};
use sha3::{Digest, Keccak256};

use crate::error::EthError;

const WORD: usize = 32;

/// A declared ABI type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiType {
    Address,
    Bool,
    /// `uintN`, N in 8..=256, multiple of 8.
    Uint(usize),
    /// `intN`, N in 8..=256, multiple of 8.
    Int(usize),
    /// `bytesN`, N in 1..=32.
    FixedBytes(usize),
    Bytes,
    String,
    /// `T[]`
    Array(Box<AbiType>),
    /// `T[k]`
    FixedArray(Box<AbiType>, usize),
    /// `(T1,T2,...)`
    Tuple(Vec<AbiType>),
}

/// A decoded (or to-be-encoded) ABI value, tagged by type category.
///
/// Widths are carried by the declared [`AbiType`], so `Uint`/`Int` hold full
/// 256-bit values and the codec checks that they fit.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AbiValue {
    Address(Address),
    Bool(bool),
    Uint(U256),
    Int(I256),
    FixedBytes(Vec<u8>),
    Bytes(Vec<u8>),
    String(String),
    Array(Vec<AbiValue>),
    FixedArray(Vec<AbiValue>),
    Tuple(Vec<AbiValue>),
}

impl AbiValue {
    pub fn as_address(&self) -> Option<Address> {
        match self {
            AbiValue::Address(a) => Some(*a),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AbiValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<U256> {
        match self {
            AbiValue::Uint(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<I256> {
        match self {
            AbiValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Byte content of `bytes` and `bytesN` values.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            AbiValue::Bytes(b) | AbiValue::FixedBytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AbiValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Elements of `T[]` and `T[k]` values.
    pub fn as_array(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Array(items) | AbiValue::FixedArray(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&[AbiValue]> {
        match self {
            AbiValue::Tuple(items) => Some(items),
            _ => None,
        }
    }

    fn category(&self) -> &'static str {
        match self {
            AbiValue::Address(_) => "address",
            AbiValue::Bool(_) => "bool",
            AbiValue::Uint(_) => "uint",
            AbiValue::Int(_) => "int",
            AbiValue::FixedBytes(_) => "fixed bytes",
            AbiValue::Bytes(_) => "bytes",
            AbiValue::String(_) => "string",
            AbiValue::Array(_) => "array",
            AbiValue::FixedArray(_) => "fixed array",
            AbiValue::Tuple(_) => "tuple",
        }
    }
}

impl From<Address> for AbiValue {
    fn from(value: Address) -> Self {
        AbiValue::Address(value)
    }
}

impl From<U256> for AbiValue {
    fn from(value: U256) -> Self {
        AbiValue::Uint(value)
    }
}

impl From<bool> for AbiValue {
    fn from(value: bool) -> Self {
        AbiValue::Bool(value)
    }
}

impl AbiType {
    /// Parses a canonical or shorthand type string (`uint` means `uint256`).
    pub fn parse(s: &str) -> Result<Self, EthError> {
        let s = s.trim();
        let bad = || EthError::EncodingError(format!("unknown ABI type {s:?}"));

        if let Some(stripped) = s.strip_suffix(']') {
            let open = stripped.rfind('[').ok_or_else(bad)?;
            let inner = AbiType::parse(&stripped[..open])?;
            let dim = &stripped[open + 1..];
            return if dim.is_empty() {
                Ok(AbiType::Array(Box::new(inner)))
            } else {
                let len = dim.parse::<usize>().map_err(|_| bad())?;
                Ok(AbiType::FixedArray(Box::new(inner), len))
            };
        }

        let tuple_body = s
            .strip_prefix("tuple")
            .unwrap_or(s)
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'));
        if let Some(body) = tuple_body {
            return Ok(AbiType::Tuple(parse_type_list(body)?));
        }

        match s {
            "address" => return Ok(AbiType::Address),
            "bool" => return Ok(AbiType::Bool),
            "string" => return Ok(AbiType::String),
            "bytes" => return Ok(AbiType::Bytes),
            "uint" => return Ok(AbiType::Uint(256)),
            "int" => return Ok(AbiType::Int(256)),
            _ => {}
        }

        if let Some(bits) = s.strip_prefix("uint") {
            let bits = bits.parse::<usize>().map_err(|_| bad())?;
            return valid_int_width(bits).then_some(AbiType::Uint(bits)).ok_or_else(bad);
        }
        if let Some(bits) = s.strip_prefix("int") {
            let bits = bits.parse::<usize>().map_err(|_| bad())?;
            return valid_int_width(bits).then_some(AbiType::Int(bits)).ok_or_else(bad);
        }
        if let Some(len) = s.strip_prefix("bytes") {
            let len = len.parse::<usize>().map_err(|_| bad())?;
            return (1..=32).contains(&len).then_some(AbiType::FixedBytes(len)).ok_or_else(bad);
        }

        Err(bad())
    }

    /// Dynamic types are encoded out-of-line behind an offset.
    pub fn is_dynamic(&self) -> bool {
        match self {
            AbiType::Bytes | AbiType::String | AbiType::Array(_) => true,
            AbiType::FixedArray(inner, _) => inner.is_dynamic(),
            AbiType::Tuple(items) => items.iter().any(AbiType::is_dynamic),
            _ => false,
        }
    }

    /// Size of this type's slot in the head of an enclosing tuple.
    fn head_size(&self) -> usize {
        if self.is_dynamic() {
            return WORD;
        }
        match self {
            AbiType::FixedArray(inner, len) => inner.head_size() * len,
            AbiType::Tuple(items) => items.iter().map(AbiType::head_size).sum(),
            _ => WORD,
        }
    }
}

impl fmt::Display for AbiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbiType::Address => write!(f, "address"),
            AbiType::Bool => write!(f, "bool"),
            AbiType::Uint(bits) => write!(f, "uint{bits}"),
            AbiType::Int(bits) => write!(f, "int{bits}"),
            AbiType::FixedBytes(len) => write!(f, "bytes{len}"),
            AbiType::Bytes => write!(f, "bytes"),
            AbiType::String => write!(f, "string"),
            AbiType::Array(inner) => write!(f, "{inner}[]"),
            AbiType::FixedArray(inner, len) => write!(f, "{inner}[{len}]"),
            AbiType::Tuple(items) => write!(f, "({})", join_types(items)),
        }
    }
}

/// A contract function with declared input and output types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Function {
    pub name: String,
    pub inputs: Vec<AbiType>,
    pub outputs: Vec<AbiType>,
}

impl Function {
    pub fn new(name: impl Into<String>, inputs: Vec<AbiType>, outputs: Vec<AbiType>) -> Self {
        Self { name: name.into(), inputs, outputs }
    }

    /// Parses `name(type,...)` optionally followed by `returns (type,...)`.
    ///
    /// Parameter names and data-location keywords after each type are
    /// ignored: `transfer(address to, uint256 amount) returns (bool)`.
    pub fn parse(signature: &str) -> Result<Self, EthError> {
        let signature = signature.trim();
        let bad = |why: &str| EthError::EncodingError(format!("invalid function signature {signature:?}: {why}"));

        let open = signature.find('(').ok_or_else(|| bad("missing '('"))?;
        let head = signature[..open].trim();
        let name = match head.strip_prefix("function") {
            Some(rest) if rest.starts_with(char::is_whitespace) => rest.trim(),
            _ => head,
        };
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$') {
            return Err(bad("invalid name"));
        }

        let close = matching_paren(signature, open).ok_or_else(|| bad("unbalanced parentheses"))?;
        let inputs = parse_type_list(&signature[open + 1..close])?;

        let rest = signature[close + 1..].trim();
        let outputs = if rest.is_empty() {
            Vec::new()
        } else {
            let list = rest
                .strip_prefix("returns")
                .map(str::trim)
                .and_then(|r| r.strip_prefix('('))
                .and_then(|r| r.strip_suffix(')'))
                .ok_or_else(|| bad("expected 'returns (...)'"))?;
            parse_type_list(list)?
        };

        Ok(Self { name: name.to_string(), inputs, outputs })
    }

    /// Canonical signature used for the selector, e.g. `transfer(address,uint256)`.
    pub fn signature(&self) -> String {
        format!("{}({})", self.name, join_types(&self.inputs))
    }

    /// First four bytes of the Keccak-256 hash of the canonical signature.
    pub fn selector(&self) -> [u8; 4] {
        selector(&self.signature())
    }

    /// Encodes `selector || abi_encode(inputs, args)`.
    pub fn encode_input(&self, args: &[AbiValue]) -> Result<Vec<u8>, EthError> {
        let body = encode(&self.inputs, args)?;
        let mut data = Vec::with_capacity(4 + body.len());
        data.extend_from_slice(&self.selector());
        data.extend_from_slice(&body);
        Ok(data)
    }

    /// Decodes call data produced by [`Function::encode_input`].
    pub fn decode_input(&self, data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
        if data.len() < 4 {
            return Err(EthError::DecodingError(format!(
                "call data of {} bytes has no selector",
                data.len()
            )));
        }
        if data[..4] != self.selector() {
            return Err(EthError::DecodingError(format!(
                "selector 0x{} does not match {}",
                hex::encode(&data[..4]),
                self.signature()
            )));
        }
        decode(&self.inputs, &data[4..])
    }

    /// Encodes values as this function would return them.
    pub fn encode_output(&self, values: &[AbiValue]) -> Result<Vec<u8>, EthError> {
        encode(&self.outputs, values)
    }

    /// Decodes returned bytes according to the declared output types.
    pub fn decode_output(&self, data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
        decode(&self.outputs, data)
    }
}

/// Encodes a call to `function` with `args` into call payload bytes.
pub fn encode_call(function: &Function, args: &[AbiValue]) -> Result<Vec<u8>, EthError> {
    function.encode_input(args)
}

/// Decodes the bytes returned by a call to `function`.
pub fn decode_result(function: &Function, data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    function.decode_output(data)
}

/// Computes the 4-byte selector of a canonical function signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    let mut out = [0u8; 4];
    out.copy_from_slice(&hash[..4]);
    out
}

/// ABI-encodes `values` as a tuple of `types`.
pub fn encode(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, EthError> {
    encode_tuple(types, values)
}

/// ABI-decodes `data` as a tuple of `types`.
///
/// An all-static layout must match the data length exactly.
pub fn decode(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    let head: usize = types.iter().map(AbiType::head_size).sum();
    let dynamic = types.iter().any(AbiType::is_dynamic);

    if data.len() < head || (!dynamic && data.len() != head) {
        return Err(EthError::DecodingError(format!(
            "expected {}{head} bytes for ({}), got {}",
            if dynamic { "at least " } else { "" },
            join_types(types),
            data.len()
        )));
    }

    decode_tuple(types, data)
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn encode_tuple(types: &[AbiType], values: &[AbiValue]) -> Result<Vec<u8>, EthError> {
    if types.len() != values.len() {
        return Err(EthError::EncodingError(format!(
            "expected {} values for ({}), got {}",
            types.len(),
            join_types(types),
            values.len()
        )));
    }

    let head_len: usize = types.iter().map(AbiType::head_size).sum();
    let mut head = Vec::with_capacity(head_len);
    let mut tail = Vec::new();

    for (ty, value) in types.iter().zip(values) {
        let encoded = encode_value(ty, value)?;
        if ty.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            tail.extend_from_slice(&encoded);
        } else {
            head.extend_from_slice(&encoded);
        }
    }

    head.extend_from_slice(&tail);
    Ok(head)
}

fn encode_value(ty: &AbiType, value: &AbiValue) -> Result<Vec<u8>, EthError> {
    let mismatch = || EthError::EncodingError(format!("expected {ty}, got {} value", value.category()));

    match (ty, value) {
        (AbiType::Address, AbiValue::Address(addr)) => {
            // Left-pad: 12 zero bytes + 20 address bytes.
            let mut word = [0u8; WORD];
            word[12..].copy_from_slice(addr.as_slice());
            Ok(word.to_vec())
        }
        (AbiType::Bool, AbiValue::Bool(b)) => Ok(usize_word(*b as usize).to_vec()),
        (AbiType::Uint(bits), AbiValue::Uint(v)) => {
            if *bits < 256 && *v >> *bits != U256::ZERO {
                return Err(EthError::EncodingError(format!("{v} does not fit in uint{bits}")));
            }
            Ok(v.to_be_bytes::<WORD>().to_vec())
        }
        (AbiType::Int(bits), AbiValue::Int(v)) => {
            let word = v.into_raw().to_be_bytes::<WORD>();
            if !sign_extended(&word, *bits) {
                return Err(EthError::EncodingError(format!("{v} does not fit in int{bits}")));
            }
            Ok(word.to_vec())
        }
        (AbiType::FixedBytes(len), AbiValue::FixedBytes(bytes)) => {
            if bytes.len() != *len {
                return Err(EthError::EncodingError(format!(
                    "expected {len} bytes for bytes{len}, got {}",
                    bytes.len()
                )));
            }
            // Right-pad: data + trailing zero bytes.
            let mut word = [0u8; WORD];
            word[..*len].copy_from_slice(bytes);
            Ok(word.to_vec())
        }
        (AbiType::Bytes, AbiValue::Bytes(bytes)) => Ok(encode_packed_bytes(bytes)),
        (AbiType::String, AbiValue::String(s)) => Ok(encode_packed_bytes(s.as_bytes())),
        (AbiType::Array(inner), AbiValue::Array(items)) => {
            let types = vec![(**inner).clone(); items.len()];
            let mut out = usize_word(items.len()).to_vec();
            out.extend_from_slice(&encode_tuple(&types, items)?);
            Ok(out)
        }
        (AbiType::FixedArray(inner, len), AbiValue::FixedArray(items)) => {
            if items.len() != *len {
                return Err(EthError::EncodingError(format!(
                    "expected {len} elements for {ty}, got {}",
                    items.len()
                )));
            }
            encode_tuple(&vec![(**inner).clone(); *len], items)
        }
        (AbiType::Tuple(types), AbiValue::Tuple(items)) => encode_tuple(types, items),
        _ => Err(mismatch()),
    }
}

fn encode_packed_bytes(bytes: &[u8]) -> Vec<u8> {
    let padded = bytes.len().div_ceil(WORD) * WORD;
    let mut out = Vec::with_capacity(WORD + padded);
    out.extend_from_slice(&usize_word(bytes.len()));
    out.extend_from_slice(bytes);
    out.resize(WORD + padded, 0);
    out
}

fn usize_word(value: usize) -> [u8; WORD] {
    U256::from(value).to_be_bytes::<WORD>()
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Decodes a tuple whose head starts at `data[0]`; offsets are relative to it.
fn decode_tuple(types: &[AbiType], data: &[u8]) -> Result<Vec<AbiValue>, EthError> {
    let mut values = Vec::with_capacity(types.len());
    let mut cursor = 0usize;

    for ty in types {
        if ty.is_dynamic() {
            let offset = read_usize(data, cursor)?;
            if offset > data.len() {
                return Err(EthError::DecodingError(format!(
                    "offset {offset} for {ty} is outside {} bytes of data",
                    data.len()
                )));
            }
            values.push(decode_value(ty, &data[offset..])?);
            cursor += WORD;
        } else {
            let size = ty.head_size();
            let end = cursor.checked_add(size).filter(|end| *end <= data.len()).ok_or_else(|| {
                EthError::DecodingError(format!(
                    "{ty} at offset {cursor} needs {size} bytes, only {} available",
                    data.len().saturating_sub(cursor)
                ))
            })?;
            values.push(decode_value(ty, &data[cursor..end])?);
            cursor = end;
        }
    }

    Ok(values)
}

fn decode_value(ty: &AbiType, data: &[u8]) -> Result<AbiValue, EthError> {
    match ty {
        AbiType::Address => {
            let word = read_word(data, 0)?;
            if word[..12].iter().any(|b| *b != 0) {
                return Err(EthError::DecodingError("dirty high bytes in address word".into()));
            }
            Ok(AbiValue::Address(Address::from_slice(&word[12..])))
        }
        AbiType::Bool => {
            let word = read_word(data, 0)?;
            match U256::from_be_bytes(word) {
                v if v == U256::ZERO => Ok(AbiValue::Bool(false)),
                v if v == U256::from(1u8) => Ok(AbiValue::Bool(true)),
                v => Err(EthError::DecodingError(format!("{v} is not a valid bool"))),
            }
        }
        AbiType::Uint(bits) => {
            let word = read_word(data, 0)?;
            let value = U256::from_be_bytes(word);
            if *bits < 256 && value >> *bits != U256::ZERO {
                return Err(EthError::DecodingError(format!("{value} does not fit in uint{bits}")));
            }
            Ok(AbiValue::Uint(value))
        }
        AbiType::Int(bits) => {
            let word = read_word(data, 0)?;
            if !sign_extended(&word, *bits) {
                return Err(EthError::DecodingError(format!("word is not a sign-extended int{bits}")));
            }
            Ok(AbiValue::Int(I256::from_raw(U256::from_be_bytes(word))))
        }
        AbiType::FixedBytes(len) => {
            let word = read_word(data, 0)?;
            if word[*len..].iter().any(|b| *b != 0) {
                return Err(EthError::DecodingError(format!("dirty padding in bytes{len}")));
            }
            Ok(AbiValue::FixedBytes(word[..*len].to_vec()))
        }
        AbiType::Bytes => Ok(AbiValue::Bytes(read_packed_bytes(data)?.to_vec())),
        AbiType::String => {
            let bytes = read_packed_bytes(data)?;
            String::from_utf8(bytes.to_vec())
                .map(AbiValue::String)
                .map_err(|e| EthError::DecodingError(format!("string is not valid UTF-8: {e}")))
        }
        AbiType::Array(inner) => {
            let len = read_usize(data, 0)?;
            let body = &data[WORD..];
            // Every element occupies at least one head slot.
            if len.saturating_mul(inner.head_size()) > body.len() {
                return Err(EthError::DecodingError(format!(
                    "array length {len} exceeds {} available bytes",
                    body.len()
                )));
            }
            decode_tuple(&vec![(**inner).clone(); len], body).map(AbiValue::Array)
        }
        AbiType::FixedArray(inner, len) => {
            decode_tuple(&vec![(**inner).clone(); *len], data).map(AbiValue::FixedArray)
        }
        AbiType::Tuple(types) => decode_tuple(types, data).map(AbiValue::Tuple),
    }
}

fn read_word(data: &[u8], at: usize) -> Result<[u8; WORD], EthError> {
    let slice = at
        .checked_add(WORD)
        .and_then(|end| data.get(at..end))
        .ok_or_else(|| {
            EthError::DecodingError(format!(
                "expected 32 bytes at offset {at}, got {}",
                data.len().saturating_sub(at)
            ))
        })?;
    let mut word = [0u8; WORD];
    word.copy_from_slice(slice);
    Ok(word)
}

fn read_usize(data: &[u8], at: usize) -> Result<usize, EthError> {
    let word = read_word(data, at)?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(EthError::DecodingError(format!(
            "offset or length at {at} is out of range"
        )));
    }
    let mut low = [0u8; 8];
    low.copy_from_slice(&word[24..]);
    usize::try_from(u64::from_be_bytes(low))
        .map_err(|_| EthError::DecodingError(format!("offset or length at {at} is out of range")))
}

fn read_packed_bytes(data: &[u8]) -> Result<&[u8], EthError> {
    let len = read_usize(data, 0)?;
    let body = &data[WORD..];
    match len.checked_next_multiple_of(WORD) {
        Some(padded) if padded <= body.len() => Ok(&body[..len]),
        _ => Err(EthError::DecodingError(format!(
            "byte string of length {len} exceeds {} available bytes",
            body.len()
        ))),
    }
}

/// True if the word is a valid two's-complement `int{bits}`: every byte above
/// the value's width repeats its sign bit.
fn sign_extended(word: &[u8; WORD], bits: usize) -> bool {
    let value_bytes = bits / 8;
    let first = WORD - value_bytes;
    let fill = if word[first] & 0x80 != 0 { 0xff } else { 0x00 };
    word[..first].iter().all(|b| *b == fill)
}

// ---------------------------------------------------------------------------
// Signature parsing helpers
// ---------------------------------------------------------------------------

fn valid_int_width(bits: usize) -> bool {
    bits > 0 && bits <= 256 && bits % 8 == 0
}

fn join_types(types: &[AbiType]) -> String {
    types.iter().map(ToString::to_string).collect::<Vec<_>>().join(",")
}

fn matching_paren(s: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices().skip_while(|(i, _)| *i < open) {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

/// Splits a comma-separated parameter list at top level and parses each type,
/// dropping trailing parameter names and keywords.
fn parse_type_list(list: &str) -> Result<Vec<AbiType>, EthError> {
    if list.trim().is_empty() {
        return Ok(Vec::new());
    }

    let mut types = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, c) in list.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                types.push(AbiType::parse(first_token(&list[start..i]))?);
                start = i + 1;
            }
            _ => {}
        }
    }
    types.push(AbiType::parse(first_token(&list[start..]))?);
    Ok(types)
}

/// First whitespace-separated token at parenthesis depth zero.
fn first_token(param: &str) -> &str {
    let param = param.trim();
    let mut depth = 0i32;
    for (i, c) in param.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => return &param[..i],
            _ => {}
        }
    }
    param
}
