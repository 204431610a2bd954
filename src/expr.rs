#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pseudo {
    AccountId,
    Partition,
    Region,
    StackId,
    StackName,
    UrlSuffix,
}

impl Pseudo {
    pub fn as_str(&self) -> &'static str {
        match self {
            Pseudo::AccountId => "AWS::AccountId",
            Pseudo::Partition => "AWS::Partition",
            Pseudo::Region => "AWS::Region",
            Pseudo::StackId => "AWS::StackId",
            Pseudo::StackName => "AWS::StackName",
            Pseudo::UrlSuffix => "AWS::URLSuffix",
        }
    }
}

/// An attribute value. References are kept as placeholders and only
/// resolved when the template is rendered.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    ParamRef(String),
    ResourceRef(String),
    Pseudo(Pseudo),
    MapLookup {
        table: String,
        top: Box<Expr>,
        second: Box<Expr>,
    },
    AttrRef { resource: String, attribute: String },
    Join { separator: String, parts: Vec<Expr> },
    Base64(Box<Expr>),
}

impl Expr {
    pub fn str(value: impl Into<String>) -> Self {
        Expr::Str(value.into())
    }

    pub fn param(name: impl Into<String>) -> Self {
        Expr::ParamRef(name.into())
    }

    pub fn resource(name: impl Into<String>) -> Self {
        Expr::ResourceRef(name.into())
    }

    pub fn join<I, E>(separator: impl Into<String>, parts: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<Expr>,
    {
        Expr::Join {
            separator: separator.into(),
            parts: parts.into_iter().map(Into::into).collect(),
        }
    }

    pub fn find_in_map(
        table: impl Into<String>,
        top: impl Into<Expr>,
        second: impl Into<Expr>,
    ) -> Self {
        Expr::MapLookup {
            table: table.into(),
            top: Box::new(top.into()),
            second: Box::new(second.into()),
        }
    }

    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Expr::AttrRef {
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }

    pub fn base64(inner: impl Into<Expr>) -> Self {
        Expr::Base64(Box::new(inner.into()))
    }

    pub fn object<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Expr>,
    {
        Expr::Object(
            pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

impl From<&str> for Expr {
    fn from(value: &str) -> Self {
        Expr::Str(value.to_string())
    }
}

impl From<String> for Expr {
    fn from(value: String) -> Self {
        Expr::Str(value)
    }
}

impl From<i64> for Expr {
    fn from(value: i64) -> Self {
        Expr::Int(value)
    }
}

impl From<bool> for Expr {
    fn from(value: bool) -> Self {
        Expr::Bool(value)
    }
}

impl From<Pseudo> for Expr {
    fn from(value: Pseudo) -> Self {
        Expr::Pseudo(value)
    }
}

impl<E: Into<Expr>> From<Vec<E>> for Expr {
    fn from(items: Vec<E>) -> Self {
        Expr::List(items.into_iter().map(Into::into).collect())
    }
}
