//! In-memory engine for tests.
//!
//! Implements the full [`Engine`] surface over boxed nodes and keeps a
//! ledger of every live allocation, so tests can assert that each handle
//! was released exactly once. Freeing an address that is not live panics.
//!
//! The text format understood here is a small GBLN subset sufficient for
//! round trips:
//!
//! ```text
//! member  := key ( '{' member* '}' | '[' element* ']' | typed )
//! element := '{' member* '}' | '[' element* ']' | typed
//! typed   := '<' hint '>' '(' raw ')'
//! ```

use std::cell::{Cell, RefCell};
use std::ffi::{c_char, CStr, CString};
use std::fmt::Write as _;
use std::path::PathBuf;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::ErrorCode;
use crate::ffi::{Engine, RawCode, RawConfig, RawTag, RawValue, ValueType};

enum Node {
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str { value: CString, max_len: usize },
    Bool(bool),
    Null,
    Object(Vec<(CString, *mut RawValue)>),
    Array(Vec<*mut RawValue>),
}

impl Node {
    fn value_type(&self) -> ValueType {
        match self {
            Node::I8(_) => ValueType::I8,
            Node::I16(_) => ValueType::I16,
            Node::I32(_) => ValueType::I32,
            Node::I64(_) => ValueType::I64,
            Node::U8(_) => ValueType::U8,
            Node::U16(_) => ValueType::U16,
            Node::U32(_) => ValueType::U32,
            Node::U64(_) => ValueType::U64,
            Node::F32(_) => ValueType::F32,
            Node::F64(_) => ValueType::F64,
            Node::Str { .. } => ValueType::Str,
            Node::Bool(_) => ValueType::Bool,
            Node::Null => ValueType::Null,
            Node::Object(_) => ValueType::Object,
            Node::Array(_) => ValueType::Array,
        }
    }
}

/// Configuration as seen by the test engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockConfig {
    pub mini_mode: bool,
    pub compress: bool,
    pub compression_level: u8,
    pub indent: usize,
    pub strip_comments: bool,
}

struct Failure {
    code: ErrorCode,
    message: String,
    suggestion: Option<String>,
}

impl Failure {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            suggestion: None,
        }
    }

    fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

/// In-memory engine with allocation accounting and failure injection.
#[derive(Default)]
pub struct MockEngine {
    values: RefCell<FxHashSet<usize>>,
    strings: RefCell<FxHashSet<usize>>,
    key_lists: RefCell<FxHashMap<usize, usize>>,
    configs: RefCell<FxHashSet<usize>>,
    value_frees: Cell<usize>,
    allocations: Cell<usize>,
    building_calls: Cell<usize>,
    last_error: RefCell<Option<(String, Option<String>)>>,
    last_config: Cell<Option<MockConfig>>,
    poisoned: RefCell<FxHashSet<usize>>,
    corrupt_tags: RefCell<FxHashSet<usize>>,
    fail_allocation_at: Cell<Option<usize>>,
    reject_building_at: Cell<Option<usize>>,
    fail_serialise: Cell<bool>,
    null_root: Cell<bool>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    // --- Accounting ---

    /// Number of live value nodes, children included.
    pub fn live_values(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn live_strings(&self) -> usize {
        self.strings.borrow().len()
    }

    pub fn live_key_lists(&self) -> usize {
        self.key_lists.borrow().len()
    }

    pub fn live_configs(&self) -> usize {
        self.configs.borrow().len()
    }

    /// Number of `value_free` calls (a container frees its children itself).
    pub fn value_frees(&self) -> usize {
        self.value_frees.get()
    }

    /// Number of value nodes ever allocated.
    pub fn allocations(&self) -> usize {
        self.allocations.get()
    }

    /// Asserts nothing is left allocated.
    pub fn assert_clean(&self) {
        assert_eq!(self.live_values(), 0, "leaked value nodes");
        assert_eq!(self.live_strings(), 0, "leaked strings");
        assert_eq!(self.live_key_lists(), 0, "leaked key lists");
        assert_eq!(self.live_configs(), 0, "leaked configs");
    }

    pub fn last_config(&self) -> Option<MockConfig> {
        self.last_config.get()
    }

    // --- Failure injection ---

    /// Makes every typed accessor report failure for `value`.
    pub fn poison(&self, value: *const RawValue) {
        self.poisoned.borrow_mut().insert(value as usize);
    }

    /// Makes `value_type` report an unknown tag for `value`.
    pub fn corrupt_tag(&self, value: *const RawValue) {
        self.corrupt_tags.borrow_mut().insert(value as usize);
    }

    /// Makes the `n`-th (zero-based) value allocation from now return null.
    pub fn fail_allocation_at(&self, n: usize) {
        self.fail_allocation_at.set(Some(self.allocations.get() + n));
    }

    /// Makes the `n`-th (zero-based) insert/push call from now fail.
    pub fn reject_building_at(&self, n: usize) {
        self.reject_building_at.set(Some(self.building_calls.get() + n));
    }

    /// Makes `to_string` and `to_string_pretty` return null.
    pub fn fail_serialise(&self) {
        self.fail_serialise.set(true);
    }

    /// Makes `parse` and `read_io` report success without a root value.
    pub fn null_root_on_success(&self) {
        self.null_root.set(true);
    }

    // --- Inspection ---

    /// Returns the type of a live value.
    pub fn type_of(&self, value: *const RawValue) -> Option<ValueType> {
        unsafe { self.node(value) }.map(Node::value_type)
    }

    /// Returns the capacity a string value was created with.
    pub fn string_capacity(&self, value: *const RawValue) -> Option<usize> {
        match unsafe { self.node(value) } {
            Some(Node::Str { max_len, .. }) => Some(*max_len),
            _ => None,
        }
    }

    /// Returns the `index`-th child of an object or array (borrowed).
    pub fn child_at(&self, value: *const RawValue, index: usize) -> *mut RawValue {
        match unsafe { self.node(value) } {
            Some(Node::Object(entries)) => entries
                .get(index)
                .map(|(_, v)| *v)
                .unwrap_or(std::ptr::null_mut()),
            Some(Node::Array(items)) => items.get(index).copied().unwrap_or(std::ptr::null_mut()),
            _ => std::ptr::null_mut(),
        }
    }

    // --- Internals ---

    unsafe fn node<'a>(&self, value: *const RawValue) -> Option<&'a Node> {
        if value.is_null() || !self.values.borrow().contains(&(value as usize)) {
            return None;
        }
        Some(unsafe { &*(value as *const Node) })
    }

    #[allow(clippy::mut_from_ref)]
    unsafe fn node_mut<'a>(&self, value: *mut RawValue) -> Option<&'a mut Node> {
        if value.is_null() || !self.values.borrow().contains(&(value as usize)) {
            return None;
        }
        Some(unsafe { &mut *(value as *mut Node) })
    }

    fn alloc(&self, node: Node) -> *mut RawValue {
        let n = self.allocations.get();
        if self.fail_allocation_at.get() == Some(n) {
            self.fail_allocation_at.set(None);
            return std::ptr::null_mut();
        }
        self.allocations.set(n + 1);
        let ptr = Box::into_raw(Box::new(node)) as *mut RawValue;
        self.values.borrow_mut().insert(ptr as usize);
        ptr
    }

    fn free_node(&self, value: *mut RawValue) {
        if !self.values.borrow_mut().remove(&(value as usize)) {
            panic!("double free or foreign pointer: {value:p}");
        }
        let node = unsafe { Box::from_raw(value as *mut Node) };
        match *node {
            Node::Object(entries) => {
                for (_, child) in entries {
                    self.free_node(child);
                }
            }
            Node::Array(items) => {
                for child in items {
                    self.free_node(child);
                }
            }
            _ => {}
        }
    }

    fn alloc_string(&self, s: &str) -> *mut c_char {
        let cs = CString::new(s.replace('\0', "")).unwrap_or_default();
        let ptr = cs.into_raw();
        self.strings.borrow_mut().insert(ptr as usize);
        ptr
    }

    fn set_error(&self, failure: &Failure) {
        *self.last_error.borrow_mut() = Some((failure.message.clone(), failure.suggestion.clone()));
    }

    fn next_building_call_rejected(&self) -> bool {
        let n = self.building_calls.get();
        self.building_calls.set(n + 1);
        if self.reject_building_at.get() == Some(n) {
            self.reject_building_at.set(None);
            return true;
        }
        false
    }

    fn accessor<T: Default>(
        &self,
        value: *const RawValue,
        ok: *mut bool,
        extract: impl FnOnce(&Node) -> Option<T>,
    ) -> T {
        let poisoned = self.poisoned.borrow().contains(&(value as usize));
        let result = match unsafe { self.node(value) } {
            Some(node) if !poisoned => extract(node),
            _ => None,
        };
        if !ok.is_null() {
            unsafe { *ok = result.is_some() };
        }
        result.unwrap_or_default()
    }

    fn build(&self, tree: Tree) -> *mut RawValue {
        match tree {
            Tree::Scalar(node) => self.alloc(node),
            Tree::Object(members) => {
                let children = members
                    .into_iter()
                    .map(|(k, t)| (k, self.build(t)))
                    .collect();
                self.alloc(Node::Object(children))
            }
            Tree::Array(items) => {
                let children = items.into_iter().map(|t| self.build(t)).collect();
                self.alloc(Node::Array(children))
            }
        }
    }

    fn parse_text(&self, input: &str, out_value: *mut *mut RawValue) -> RawCode {
        match TextReader::new(input.as_bytes()).read_document() {
            Ok(_) if self.null_root.get() => {
                unsafe { *out_value = std::ptr::null_mut() };
                ErrorCode::Ok.as_raw()
            }
            Ok(tree) => {
                let root = self.build(tree);
                unsafe { *out_value = root };
                ErrorCode::Ok.as_raw()
            }
            Err(failure) => {
                self.set_error(&failure);
                failure.code.as_raw()
            }
        }
    }

    fn render(&self, value: *const RawValue, pretty: bool) -> Option<String> {
        let node = unsafe { self.node(value) }?;
        let mut out = String::new();
        match node {
            Node::Object(entries) => self.write_members(&mut out, entries, 0, pretty),
            other => self.write_element(&mut out, other, 0, pretty),
        }
        Some(out)
    }

    fn write_members(&self, out: &mut String, entries: &[(CString, *mut RawValue)], depth: usize, pretty: bool) {
        for (key, child) in entries {
            if pretty {
                out.push_str(&"  ".repeat(depth));
            }
            out.push_str(&key.to_string_lossy());
            if let Some(node) = unsafe { self.node(*child) } {
                self.write_element(out, node, depth, pretty);
            }
            if pretty {
                out.push('\n');
            }
        }
    }

    fn write_element(&self, out: &mut String, node: &Node, depth: usize, pretty: bool) {
        match node {
            Node::Object(entries) => {
                out.push('{');
                if pretty && !entries.is_empty() {
                    out.push('\n');
                    self.write_members(out, entries, depth + 1, pretty);
                    out.push_str(&"  ".repeat(depth));
                } else {
                    self.write_members(out, entries, depth + 1, pretty);
                }
                out.push('}');
            }
            Node::Array(items) => {
                out.push('[');
                for (i, child) in items.iter().enumerate() {
                    if pretty && i > 0 {
                        out.push(' ');
                    }
                    if let Some(node) = unsafe { self.node(*child) } {
                        self.write_element(out, node, depth, pretty);
                    }
                }
                out.push(']');
            }
            scalar => write_scalar(out, scalar),
        }
    }
}

fn write_scalar(out: &mut String, node: &Node) {
    let raw = match node {
        Node::I8(v) => v.to_string(),
        Node::I16(v) => v.to_string(),
        Node::I32(v) => v.to_string(),
        Node::I64(v) => v.to_string(),
        Node::U8(v) => v.to_string(),
        Node::U16(v) => v.to_string(),
        Node::U32(v) => v.to_string(),
        Node::U64(v) => v.to_string(),
        Node::F32(v) => v.to_string(),
        Node::F64(v) => v.to_string(),
        Node::Str { value, .. } => escape(&value.to_string_lossy()),
        Node::Bool(b) => (if *b { "t" } else { "f" }).to_string(),
        Node::Null => String::new(),
        Node::Object(_) | Node::Array(_) => return,
    };
    let _ = match node {
        Node::Str { max_len, .. } => write!(out, "<s{max_len}>({raw})"),
        other => write!(out, "<{}>({raw})", other.value_type().hint()),
    };
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == ')' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

// =============================================================================
// TEXT READER
// =============================================================================

enum Tree {
    Scalar(Node),
    Object(Vec<(CString, Tree)>),
    Array(Vec<Tree>),
}

struct TextReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> TextReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn read_byte(&mut self, context: &'static str) -> Result<u8, Failure> {
        let byte = self.peek().ok_or_else(|| {
            Failure::new(ErrorCode::UnexpectedEof, format!("unexpected end of input in {context}"))
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn expect(&mut self, want: u8, context: &'static str) -> Result<(), Failure> {
        let got = self.read_byte(context)?;
        if got != want {
            return Err(Failure::new(
                ErrorCode::UnexpectedChar,
                format!(
                    "expected '{}' but found '{}' at offset {}",
                    want as char,
                    got as char,
                    self.pos - 1
                ),
            ));
        }
        Ok(())
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn read_document(&mut self) -> Result<Tree, Failure> {
        self.skip_ws();
        if matches!(self.peek(), Some(b'<' | b'[' | b'{')) {
            let tree = self.read_element()?;
            self.skip_ws();
            if let Some(b) = self.peek() {
                return Err(Failure::new(
                    ErrorCode::UnexpectedToken,
                    format!("trailing '{}' at offset {}", b as char, self.pos),
                ));
            }
            return Ok(tree);
        }
        self.read_members(None).map(Tree::Object)
    }

    fn read_members(&mut self, close: Option<u8>) -> Result<Vec<(CString, Tree)>, Failure> {
        let mut members: Vec<(CString, Tree)> = Vec::new();
        loop {
            self.skip_ws();
            match (self.peek(), close) {
                (None, None) => return Ok(members),
                (None, Some(_)) => {
                    return Err(Failure::new(ErrorCode::UnexpectedEof, "unclosed object")
                        .suggest("add the missing '}'"));
                }
                (Some(b), Some(c)) if b == c => {
                    self.pos += 1;
                    return Ok(members);
                }
                _ => {}
            }
            let key = self.read_key()?;
            if members.iter().any(|(k, _)| *k == key) {
                return Err(Failure::new(
                    ErrorCode::DuplicateKey,
                    format!("duplicate key '{}'", key.to_string_lossy()),
                )
                .suggest("rename or remove one of the entries"));
            }
            self.skip_ws();
            let tree = self.read_element()?;
            members.push((key, tree));
        }
    }

    fn read_key(&mut self) -> Result<CString, Failure> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-' || b >= 0x80)
        {
            self.pos += 1;
        }
        if self.pos == start {
            let found = self.peek().map(|b| b as char).unwrap_or(' ');
            return Err(Failure::new(
                ErrorCode::UnexpectedChar,
                format!("expected key but found '{found}' at offset {start}"),
            ));
        }
        Ok(CString::new(&self.data[start..self.pos]).unwrap_or_default())
    }

    fn read_element(&mut self) -> Result<Tree, Failure> {
        match self.read_byte("value")? {
            b'{' => self.read_members(Some(b'}')).map(Tree::Object),
            b'[' => {
                let mut items = Vec::new();
                loop {
                    self.skip_ws();
                    match self.peek() {
                        None => {
                            return Err(Failure::new(ErrorCode::UnexpectedEof, "unclosed array")
                                .suggest("add the missing ']'"));
                        }
                        Some(b']') => {
                            self.pos += 1;
                            return Ok(Tree::Array(items));
                        }
                        Some(_) => items.push(self.read_element()?),
                    }
                }
            }
            b'<' => self.read_typed(),
            other => Err(Failure::new(
                ErrorCode::UnexpectedToken,
                format!("unexpected '{}' at offset {}", other as char, self.pos - 1),
            )),
        }
    }

    fn read_typed(&mut self) -> Result<Tree, Failure> {
        let start = self.pos;
        while self.peek().is_some_and(|b| b != b'>') {
            self.pos += 1;
        }
        let hint = String::from_utf8_lossy(&self.data[start..self.pos]).into_owned();
        self.expect(b'>', "type hint")?;
        self.expect(b'(', "value")?;
        let raw = self.read_raw()?;
        scalar_from(&hint, &raw).map(Tree::Scalar)
    }

    fn read_raw(&mut self) -> Result<String, Failure> {
        let mut bytes = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Failure::new(ErrorCode::UnterminatedString, "unterminated value")
                        .suggest("close the value with ')'"));
                }
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    let escaped = self.read_byte("escape")?;
                    bytes.push(escaped);
                }
                Some(b) => {
                    self.pos += 1;
                    bytes.push(b);
                }
            }
        }
        String::from_utf8(bytes)
            .map_err(|_| Failure::new(ErrorCode::UnexpectedChar, "value is not valid UTF-8"))
    }
}

fn scalar_from(hint: &str, raw: &str) -> Result<Node, Failure> {
    fn int<T: std::str::FromStr>(hint: &str, raw: &str) -> Result<T, Failure> {
        raw.parse::<T>().map_err(|_| {
            if raw.parse::<i128>().is_ok() {
                Failure::new(ErrorCode::IntOutOfRange, format!("{raw} does not fit in {hint}"))
                    .suggest("use a wider integer type")
            } else {
                Failure::new(ErrorCode::TypeMismatch, format!("'{raw}' is not a valid {hint}"))
            }
        })
    }
    fn float<T: std::str::FromStr>(hint: &str, raw: &str) -> Result<T, Failure> {
        raw.parse::<T>()
            .map_err(|_| Failure::new(ErrorCode::TypeMismatch, format!("'{raw}' is not a valid {hint}")))
    }

    let node = match hint {
        "i8" => Node::I8(int(hint, raw)?),
        "i16" => Node::I16(int(hint, raw)?),
        "i32" => Node::I32(int(hint, raw)?),
        "i64" => Node::I64(int(hint, raw)?),
        "u8" => Node::U8(int(hint, raw)?),
        "u16" => Node::U16(int(hint, raw)?),
        "u32" => Node::U32(int(hint, raw)?),
        "u64" => Node::U64(int(hint, raw)?),
        "f32" => Node::F32(float(hint, raw)?),
        "f64" => Node::F64(float(hint, raw)?),
        "b" => match raw {
            "t" | "true" => Node::Bool(true),
            "f" | "false" => Node::Bool(false),
            _ => {
                return Err(Failure::new(ErrorCode::TypeMismatch, format!("'{raw}' is not a bool"))
                    .suggest("use t or f"));
            }
        },
        "n" if raw.is_empty() => Node::Null,
        "n" => return Err(Failure::new(ErrorCode::TypeMismatch, "null takes no value")),
        s if s.starts_with('s') => {
            let max_len: usize = s[1..].parse().map_err(|_| {
                Failure::new(ErrorCode::InvalidTypeHint, format!("invalid type hint '{hint}'"))
            })?;
            let chars = raw.chars().count();
            if chars > max_len {
                return Err(Failure::new(
                    ErrorCode::StringTooLong,
                    format!("string of {chars} characters exceeds {hint}"),
                )
                .suggest(format!("use s{}", chars.next_power_of_two().max(2))));
            }
            let value = CString::new(raw)
                .map_err(|_| Failure::new(ErrorCode::UnexpectedChar, "NUL byte in string"))?;
            Node::Str { value, max_len }
        }
        _ => {
            return Err(Failure::new(ErrorCode::InvalidTypeHint, format!("invalid type hint '{hint}'"))
                .suggest("use one of i8-i64, u8-u64, f32, f64, sN, b, n"));
        }
    };
    Ok(node)
}

// =============================================================================
// ENGINE SURFACE
// =============================================================================

unsafe impl Engine for MockEngine {
    type Guard<'a> = ();

    fn enter(&self) -> Self::Guard<'_> {}

    unsafe fn value_free(&self, value: *mut RawValue) {
        if value.is_null() {
            return;
        }
        self.value_frees.set(self.value_frees.get() + 1);
        self.free_node(value);
    }

    unsafe fn string_free(&self, s: *mut c_char) {
        if s.is_null() {
            return;
        }
        if !self.strings.borrow_mut().remove(&(s as usize)) {
            panic!("double free of engine string: {s:p}");
        }
        drop(unsafe { CString::from_raw(s) });
    }

    unsafe fn keys_free(&self, keys: *mut *mut c_char, count: usize) {
        if keys.is_null() {
            return;
        }
        let expected = self
            .key_lists
            .borrow_mut()
            .remove(&(keys as usize))
            .unwrap_or_else(|| panic!("double free of key list: {keys:p}"));
        assert_eq!(expected, count, "key list released with the wrong count");
        let slice = unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(keys, count)) };
        for key in slice.iter() {
            drop(unsafe { CString::from_raw(*key) });
        }
    }

    unsafe fn config_free(&self, config: *mut RawConfig) {
        if config.is_null() {
            return;
        }
        if !self.configs.borrow_mut().remove(&(config as usize)) {
            panic!("double free of config: {config:p}");
        }
        drop(unsafe { Box::from_raw(config as *mut MockConfig) });
    }

    unsafe fn parse(&self, input: *const c_char, out_value: *mut *mut RawValue) -> RawCode {
        if input.is_null() || out_value.is_null() {
            self.set_error(&Failure::new(ErrorCode::NullPointer, "null argument to parse"));
            return ErrorCode::NullPointer.as_raw();
        }
        let input = unsafe { CStr::from_ptr(input) }.to_string_lossy().into_owned();
        self.parse_text(&input, out_value)
    }

    unsafe fn to_string(&self, value: *const RawValue) -> *mut c_char {
        if self.fail_serialise.get() {
            return std::ptr::null_mut();
        }
        match self.render(value, false) {
            Some(s) => self.alloc_string(&s),
            None => std::ptr::null_mut(),
        }
    }

    unsafe fn to_string_pretty(&self, value: *const RawValue) -> *mut c_char {
        if self.fail_serialise.get() {
            return std::ptr::null_mut();
        }
        match self.render(value, true) {
            Some(s) => self.alloc_string(&s),
            None => std::ptr::null_mut(),
        }
    }

    fn last_error_message(&self) -> *mut c_char {
        let message = self.last_error.borrow().as_ref().map(|(m, _)| m.clone());
        match message {
            Some(m) => self.alloc_string(&m),
            None => std::ptr::null_mut(),
        }
    }

    fn last_error_suggestion(&self) -> *mut c_char {
        let suggestion = self.last_error.borrow().as_ref().and_then(|(_, s)| s.clone());
        match suggestion {
            Some(s) => self.alloc_string(&s),
            None => std::ptr::null_mut(),
        }
    }

    unsafe fn value_type(&self, value: *const RawValue) -> RawTag {
        if self.corrupt_tags.borrow().contains(&(value as usize)) {
            return 99;
        }
        self.type_of(value).map(ValueType::as_raw).unwrap_or(-1)
    }

    unsafe fn as_i8(&self, value: *const RawValue, ok: *mut bool) -> i8 {
        self.accessor(value, ok, |n| match n {
            Node::I8(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_i16(&self, value: *const RawValue, ok: *mut bool) -> i16 {
        self.accessor(value, ok, |n| match n {
            Node::I16(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_i32(&self, value: *const RawValue, ok: *mut bool) -> i32 {
        self.accessor(value, ok, |n| match n {
            Node::I32(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_i64(&self, value: *const RawValue, ok: *mut bool) -> i64 {
        self.accessor(value, ok, |n| match n {
            Node::I64(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_u8(&self, value: *const RawValue, ok: *mut bool) -> u8 {
        self.accessor(value, ok, |n| match n {
            Node::U8(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_u16(&self, value: *const RawValue, ok: *mut bool) -> u16 {
        self.accessor(value, ok, |n| match n {
            Node::U16(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_u32(&self, value: *const RawValue, ok: *mut bool) -> u32 {
        self.accessor(value, ok, |n| match n {
            Node::U32(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_u64(&self, value: *const RawValue, ok: *mut bool) -> u64 {
        self.accessor(value, ok, |n| match n {
            Node::U64(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_f32(&self, value: *const RawValue, ok: *mut bool) -> f32 {
        self.accessor(value, ok, |n| match n {
            Node::F32(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_f64(&self, value: *const RawValue, ok: *mut bool) -> f64 {
        self.accessor(value, ok, |n| match n {
            Node::F64(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn as_string(&self, value: *const RawValue, ok: *mut bool) -> *const c_char {
        let ptr = self.accessor(value, ok, |n| match n {
            Node::Str { value, .. } => Some(value.as_ptr() as usize),
            _ => None,
        });
        ptr as *const c_char
    }

    unsafe fn as_bool(&self, value: *const RawValue, ok: *mut bool) -> bool {
        self.accessor(value, ok, |n| match n {
            Node::Bool(v) => Some(*v),
            _ => None,
        })
    }

    unsafe fn object_len(&self, value: *const RawValue) -> usize {
        match unsafe { self.node(value) } {
            Some(Node::Object(entries)) => entries.len(),
            _ => 0,
        }
    }

    unsafe fn object_get(&self, value: *const RawValue, key: *const c_char) -> *const RawValue {
        if key.is_null() {
            return std::ptr::null();
        }
        let key = unsafe { CStr::from_ptr(key) };
        match unsafe { self.node(value) } {
            Some(Node::Object(entries)) => entries
                .iter()
                .find(|(k, _)| k.as_c_str() == key)
                .map(|(_, v)| *v as *const RawValue)
                .unwrap_or(std::ptr::null()),
            _ => std::ptr::null(),
        }
    }

    unsafe fn object_keys(&self, value: *const RawValue, out_count: *mut usize) -> *mut *mut c_char {
        let keys: Vec<*mut c_char> = match unsafe { self.node(value) } {
            Some(Node::Object(entries)) => entries.iter().map(|(k, _)| k.clone().into_raw()).collect(),
            _ => Vec::new(),
        };
        if !out_count.is_null() {
            unsafe { *out_count = keys.len() };
        }
        if keys.is_empty() {
            return std::ptr::null_mut();
        }
        let count = keys.len();
        let ptr = Box::into_raw(keys.into_boxed_slice()) as *mut *mut c_char;
        self.key_lists.borrow_mut().insert(ptr as usize, count);
        ptr
    }

    unsafe fn array_len(&self, value: *const RawValue) -> usize {
        match unsafe { self.node(value) } {
            Some(Node::Array(items)) => items.len(),
            _ => 0,
        }
    }

    unsafe fn array_get(&self, value: *const RawValue, index: usize) -> *const RawValue {
        match unsafe { self.node(value) } {
            Some(Node::Array(items)) => items
                .get(index)
                .map(|v| *v as *const RawValue)
                .unwrap_or(std::ptr::null()),
            _ => std::ptr::null(),
        }
    }

    fn new_i8(&self, v: i8) -> *mut RawValue {
        self.alloc(Node::I8(v))
    }

    fn new_i16(&self, v: i16) -> *mut RawValue {
        self.alloc(Node::I16(v))
    }

    fn new_i32(&self, v: i32) -> *mut RawValue {
        self.alloc(Node::I32(v))
    }

    fn new_i64(&self, v: i64) -> *mut RawValue {
        self.alloc(Node::I64(v))
    }

    fn new_u8(&self, v: u8) -> *mut RawValue {
        self.alloc(Node::U8(v))
    }

    fn new_u16(&self, v: u16) -> *mut RawValue {
        self.alloc(Node::U16(v))
    }

    fn new_u32(&self, v: u32) -> *mut RawValue {
        self.alloc(Node::U32(v))
    }

    fn new_u64(&self, v: u64) -> *mut RawValue {
        self.alloc(Node::U64(v))
    }

    fn new_f32(&self, v: f32) -> *mut RawValue {
        self.alloc(Node::F32(v))
    }

    fn new_f64(&self, v: f64) -> *mut RawValue {
        self.alloc(Node::F64(v))
    }

    unsafe fn new_str(&self, v: *const c_char, max_len: usize) -> *mut RawValue {
        if v.is_null() {
            return std::ptr::null_mut();
        }
        let value = unsafe { CStr::from_ptr(v) }.to_owned();
        if value.to_string_lossy().chars().count() > max_len {
            return std::ptr::null_mut();
        }
        self.alloc(Node::Str { value, max_len })
    }

    fn new_bool(&self, v: bool) -> *mut RawValue {
        self.alloc(Node::Bool(v))
    }

    fn new_null(&self) -> *mut RawValue {
        self.alloc(Node::Null)
    }

    fn new_object(&self) -> *mut RawValue {
        self.alloc(Node::Object(Vec::new()))
    }

    fn new_array(&self) -> *mut RawValue {
        self.alloc(Node::Array(Vec::new()))
    }

    unsafe fn object_insert(
        &self,
        object: *mut RawValue,
        key: *const c_char,
        value: *mut RawValue,
    ) -> RawCode {
        if self.next_building_call_rejected() {
            return ErrorCode::TypeMismatch.as_raw();
        }
        if key.is_null() || unsafe { self.node(value) }.is_none() {
            return ErrorCode::NullPointer.as_raw();
        }
        let key = unsafe { CStr::from_ptr(key) };
        match unsafe { self.node_mut(object) } {
            Some(Node::Object(entries)) => {
                if entries.iter().any(|(k, _)| k.as_c_str() == key) {
                    return ErrorCode::DuplicateKey.as_raw();
                }
                // Ownership moves into the object: the node stays live but
                // is now freed through its parent.
                entries.push((key.to_owned(), value));
                ErrorCode::Ok.as_raw()
            }
            Some(_) => ErrorCode::TypeMismatch.as_raw(),
            None => ErrorCode::NullPointer.as_raw(),
        }
    }

    unsafe fn array_push(&self, array: *mut RawValue, value: *mut RawValue) -> RawCode {
        if self.next_building_call_rejected() {
            return ErrorCode::TypeMismatch.as_raw();
        }
        if unsafe { self.node(value) }.is_none() {
            return ErrorCode::NullPointer.as_raw();
        }
        match unsafe { self.node_mut(array) } {
            Some(Node::Array(items)) => {
                items.push(value);
                ErrorCode::Ok.as_raw()
            }
            Some(_) => ErrorCode::TypeMismatch.as_raw(),
            None => ErrorCode::NullPointer.as_raw(),
        }
    }

    unsafe fn write_io(
        &self,
        value: *const RawValue,
        path: *const c_char,
        config: *const RawConfig,
    ) -> RawCode {
        if path.is_null() || config.is_null() || !self.configs.borrow().contains(&(config as usize)) {
            self.set_error(&Failure::new(ErrorCode::NullPointer, "null argument to write_io"));
            return ErrorCode::NullPointer.as_raw();
        }
        let config = unsafe { *(config as *const MockConfig) };
        self.last_config.set(Some(config));
        let path = PathBuf::from(unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned());
        let Some(text) = self.render(value, !config.mini_mode) else {
            self.set_error(&Failure::new(ErrorCode::NullPointer, "null value passed to write_io"));
            return ErrorCode::NullPointer.as_raw();
        };
        match std::fs::write(&path, text) {
            Ok(()) => ErrorCode::Ok.as_raw(),
            Err(e) => {
                self.set_error(&Failure::new(
                    ErrorCode::Io,
                    format!("cannot write {}: {e}", path.display()),
                ));
                ErrorCode::Io.as_raw()
            }
        }
    }

    unsafe fn read_io(&self, path: *const c_char, out_value: *mut *mut RawValue) -> RawCode {
        if path.is_null() || out_value.is_null() {
            self.set_error(&Failure::new(ErrorCode::NullPointer, "null argument to read_io"));
            return ErrorCode::NullPointer.as_raw();
        }
        let path = PathBuf::from(unsafe { CStr::from_ptr(path) }.to_string_lossy().into_owned());
        match std::fs::read_to_string(&path) {
            Ok(text) => self.parse_text(&text, out_value),
            Err(e) => {
                self.set_error(&Failure::new(
                    ErrorCode::Io,
                    format!("cannot read {}: {e}", path.display()),
                ));
                ErrorCode::Io.as_raw()
            }
        }
    }

    fn config_new(
        &self,
        mini_mode: bool,
        compress: bool,
        compression_level: u8,
        indent: usize,
        strip_comments: bool,
    ) -> *mut RawConfig {
        let config = Box::new(MockConfig {
            mini_mode,
            compress,
            compression_level,
            indent,
            strip_comments,
        });
        let ptr = Box::into_raw(config) as *mut RawConfig;
        self.configs.borrow_mut().insert(ptr as usize);
        ptr
    }
}

impl Drop for MockEngine {
    fn drop(&mut self) {
        // Reclaim whatever a failing test left behind; only roots are freed
        // here, children go with them.
        let roots: Vec<usize> = {
            let values = self.values.borrow();
            let mut children = FxHashSet::default();
            for addr in values.iter() {
                match unsafe { &*(*addr as *const Node) } {
                    Node::Object(entries) => children.extend(entries.iter().map(|(_, v)| *v as usize)),
                    Node::Array(items) => children.extend(items.iter().map(|v| *v as usize)),
                    _ => {}
                }
            }
            values.iter().copied().filter(|a| !children.contains(a)).collect()
        };
        for root in roots {
            if self.values.borrow().contains(&root) {
                self.free_node(root as *mut RawValue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(engine: &MockEngine, text: &str) -> Result<*mut RawValue, ErrorCode> {
        let input = CString::new(text).unwrap();
        let mut out = std::ptr::null_mut();
        let code = unsafe { engine.parse(input.as_ptr(), &mut out) };
        match ErrorCode::from_raw(code).unwrap() {
            ErrorCode::Ok => Ok(out),
            other => Err(other),
        }
    }

    fn render(engine: &MockEngine, value: *mut RawValue) -> String {
        let s = unsafe { engine.to_string(value) };
        let out = unsafe { CStr::from_ptr(s) }.to_string_lossy().into_owned();
        unsafe { engine.string_free(s) };
        out
    }

    #[test]
    fn test_parse_and_render() {
        let engine = MockEngine::new();
        let text = "user{id<u32>(12345)name<s64>(Alice)tags[<s8>(a)<s8>(b\\))]}";
        let root = parse(&engine, text).unwrap();
        assert_eq!(engine.type_of(root), Some(ValueType::Object));
        assert_eq!(render(&engine, root), text);
        unsafe { engine.value_free(root) };
        engine.assert_clean();
    }

    #[test]
    fn test_parse_errors() {
        let engine = MockEngine::new();
        assert_eq!(parse(&engine, "a<u8>(256)"), Err(ErrorCode::IntOutOfRange));
        assert_eq!(parse(&engine, "a<q>(1)"), Err(ErrorCode::InvalidTypeHint));
        assert_eq!(parse(&engine, "a<s2>(abc)"), Err(ErrorCode::StringTooLong));
        assert_eq!(parse(&engine, "a<b>(x)"), Err(ErrorCode::TypeMismatch));
        assert_eq!(parse(&engine, "a<u8>(1"), Err(ErrorCode::UnterminatedString));
        assert_eq!(parse(&engine, "a{b<n>()"), Err(ErrorCode::UnexpectedEof));
        assert_eq!(parse(&engine, "a<n>()a<n>()"), Err(ErrorCode::DuplicateKey));
        engine.assert_clean();
    }

    #[test]
    #[should_panic(expected = "double free")]
    fn test_double_free_panics() {
        let engine = MockEngine::new();
        let v = engine.new_null();
        unsafe {
            engine.value_free(v);
            engine.value_free(v);
        }
    }
}
