//! Operation descriptors and responses.
//!
//! An [`Operation`] is one outbound query or mutation: a name, the static
//! document text, variables, and an optional bearer token. Its
//! [`OperationKind`] is derived once, by scanning the document for the first
//! top-level operation definition.

use crate::error::{SdkError, SdkResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// The kind of operation a document defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    /// Read-only query.
    Query,
    /// State-changing mutation.
    Mutation,
    /// Subscription (delivered over the same endpoint).
    Subscription,
}

impl OperationKind {
    /// Determines the kind of the first operation defined in `document`.
    ///
    /// Fragment definitions, comments and string literals are skipped. A
    /// document that starts with a bare selection set (`{ ... }`) is a query.
    ///
    /// # Example
    ///
    /// ```
    /// use storefront_core::OperationKind;
    ///
    /// let doc = "# adds an item\nmutation Add($sku: ID!) { addItem(sku: $sku) { id } }";
    /// assert_eq!(OperationKind::from_document(doc), OperationKind::Mutation);
    /// assert_eq!(OperationKind::from_document("{ me { id } }"), OperationKind::Query);
    /// ```
    #[must_use]
    pub fn from_document(document: &str) -> Self {
        let mut chars = document.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            match c {
                '#' => {
                    for (_, c) in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                '"' => {
                    let mut escaped = false;
                    for (_, c) in chars.by_ref() {
                        match c {
                            '\\' if !escaped => escaped = true,
                            '"' if !escaped => break,
                            _ => escaped = false,
                        }
                    }
                }
                // Shorthand query at top level.
                '{' => return Self::Query,
                c if c.is_ascii_alphabetic() => {
                    let mut end = start + c.len_utf8();
                    while let Some(&(i, next)) = chars.peek() {
                        if next.is_ascii_alphanumeric() || next == '_' {
                            end = i + next.len_utf8();
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    match &document[start..end] {
                        "query" => return Self::Query,
                        "mutation" => return Self::Mutation,
                        "subscription" => return Self::Subscription,
                        "fragment" => {
                            // Skip the whole fragment body.
                            let mut depth = 0usize;
                            for (_, c) in chars.by_ref() {
                                if c == '{' {
                                    depth = 1;
                                    break;
                                }
                            }
                            while depth > 0 {
                                match chars.next() {
                                    Some((_, '{')) => depth += 1,
                                    Some((_, '}')) => depth -= 1,
                                    Some(_) => {}
                                    None => return Self::Query,
                                }
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        Self::Query
    }
}

/// A single outbound query or mutation.
///
/// # Example
///
/// ```
/// use storefront_core::{Operation, OperationKind};
/// use serde_json::json;
///
/// let op = Operation::new("GetCart", "query GetCart($id: ID!) { cart(id: $id) { id } }")
///     .with_variables(json!({ "id": "c-1" }));
///
/// assert_eq!(op.kind(), OperationKind::Query);
/// assert_eq!(op.variables()["id"], "c-1");
/// ```
#[derive(Debug, Clone)]
pub struct Operation {
    name: String,
    document: Cow<'static, str>,
    variables: serde_json::Value,
    kind: OperationKind,
    token: Option<String>,
}

impl Operation {
    /// Creates an operation, deriving its kind from the document.
    #[must_use]
    pub fn new(name: impl Into<String>, document: impl Into<Cow<'static, str>>) -> Self {
        let document = document.into();
        let kind = OperationKind::from_document(&document);
        Self {
            name: name.into(),
            document,
            variables: serde_json::Value::Object(serde_json::Map::new()),
            kind,
            token: None,
        }
    }

    /// Sets the operation variables.
    #[must_use]
    pub fn with_variables(mut self, variables: serde_json::Value) -> Self {
        self.variables = variables;
        self
    }

    /// Attaches a bearer token for this call.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Returns the operation name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the document text.
    #[must_use]
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Returns the variables.
    #[must_use]
    pub fn variables(&self) -> &serde_json::Value {
        &self.variables
    }

    /// Returns the operation kind.
    #[must_use]
    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Returns `true` if the operation is a mutation.
    #[must_use]
    pub fn is_mutation(&self) -> bool {
        self.kind == OperationKind::Mutation
    }

    /// Returns the bearer token, if any.
    #[must_use]
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }
}

/// The settled result of an operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The `data` payload.
    pub data: serde_json::Value,
    /// Optional backend extensions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<serde_json::Value>,
}

impl Response {
    /// Creates a response with the given data.
    #[must_use]
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            extensions: None,
        }
    }

    /// Deserializes a top-level field of `data`.
    ///
    /// # Errors
    ///
    /// Returns [`SdkError::Serialization`] if the field is missing or does not
    /// match `T`.
    pub fn field<T: DeserializeOwned>(&self, name: &str) -> SdkResult<T> {
        let value = self
            .data
            .get(name)
            .cloned()
            .ok_or_else(|| SdkError::serialization(format!("response is missing field `{name}`")))?;
        Ok(serde_json::from_value(value)?)
    }
}
