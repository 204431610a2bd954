use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::bootstrap;
use crate::expr::Expr;
use crate::resources::Resource;

pub const FORMAT_VERSION: &str = "2010-09-09";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: &'static str, name: String },

    #[error("Reference to undeclared {kind}: {name}")]
    UnknownReference { kind: &'static str, name: String },

    #[error("Invalid logical name {0:?}, expected ASCII letters and digits only")]
    InvalidName(String),

    #[error("Bootstrap error: {0}")]
    Bootstrap(#[from] bootstrap::Error),

    #[error("Mapping {0} needs at least one key with at least one attribute")]
    EmptyMapping(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParameterType {
    String,
    Number,
    CommaDelimitedList,
    KeyPairName,
    VpcId,
    SubnetId,
    Other(String),
}

impl ParameterType {
    pub fn as_str(&self) -> &str {
        match self {
            ParameterType::String => "String",
            ParameterType::Number => "Number",
            ParameterType::CommaDelimitedList => "CommaDelimitedList",
            ParameterType::KeyPairName => "AWS::EC2::KeyPair::KeyName",
            ParameterType::VpcId => "AWS::EC2::VPC::Id",
            ParameterType::SubnetId => "AWS::EC2::Subnet::Id",
            ParameterType::Other(name) => name,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub description: String,
    pub kind: ParameterType,
    pub default: Option<String>,
}

/// Two-level lookup table, outer key first (usually a region).
#[derive(Debug, Clone, PartialEq)]
pub struct MappingTable {
    pub name: String,
    pub entries: Vec<(String, Vec<(String, String)>)>,
}

impl MappingTable {
    fn has_top(&self, key: &str) -> bool {
        self.entries.iter().any(|(top, _)| top == key)
    }

    fn has_second(&self, top: Option<&str>, key: &str) -> bool {
        self.entries
            .iter()
            .filter(|(entry, _)| top.map_or(true, |top| entry.as_str() == top))
            .any(|(_, attributes)| attributes.iter().any(|(name, _)| name == key))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Output {
    pub name: String,
    pub description: Option<String>,
    pub value: Expr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    #[default]
    Yaml,
    Json,
}

/// The declarative document. Everything is declared up front and only
/// resolved when rendered.
#[derive(Debug, Clone, Default)]
pub struct Template {
    description: Option<String>,
    parameters: Vec<Parameter>,
    mappings: Vec<MappingTable>,
    resources: Vec<(String, Resource)>,
    outputs: Vec<Output>,
}

impl Template {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.description = Some(description.into());
    }

    pub fn declare_parameter(
        &mut self,
        name: &str,
        description: &str,
        kind: ParameterType,
        default: Option<&str>,
    ) -> Result<(), Error> {
        validate_name(name)?;
        if self.is_ref_target(name) {
            return Err(duplicate("parameter", name));
        }
        debug!(parameter = name, kind = kind.as_str(), "declare parameter");

        self.parameters.push(Parameter {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            default: default.map(String::from),
        });
        return Ok(());
    }

    pub fn declare_mapping<T, A, K, V>(&mut self, name: &str, entries: T) -> Result<(), Error>
    where
        T: IntoIterator<Item = (K, A)>,
        A: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        validate_name(name)?;
        if self.mappings.iter().any(|m| m.name == name) {
            return Err(duplicate("mapping", name));
        }

        let mut table = MappingTable {
            name: name.to_string(),
            entries: Vec::new(),
        };
        for (top, attributes) in entries {
            let top: String = top.into();
            if table.has_top(&top) {
                return Err(duplicate("mapping key", &format!("{}.{}", name, top)));
            }
            let mut values: Vec<(String, String)> = Vec::new();
            for (key, value) in attributes {
                let key: String = key.into();
                if values.iter().any(|(existing, _)| *existing == key) {
                    return Err(duplicate(
                        "mapping key",
                        &format!("{}.{}.{}", name, top, key),
                    ));
                }
                values.push((key, value.into()));
            }
            if values.is_empty() {
                return Err(Error::EmptyMapping(format!("{}.{}", name, top)));
            }
            table.entries.push((top, values));
        }
        if table.entries.is_empty() {
            return Err(Error::EmptyMapping(name.to_string()));
        }
        debug!(mapping = name, entries = table.entries.len(), "declare mapping");

        self.mappings.push(table);
        return Ok(());
    }

    pub fn declare_resource(
        &mut self,
        name: &str,
        resource: impl Into<Resource>,
    ) -> Result<(), Error> {
        validate_name(name)?;
        if self.is_ref_target(name) {
            return Err(duplicate("resource", name));
        }
        let resource = resource.into();
        debug!(
            resource = name,
            kind = resource.kind().type_name(),
            "declare resource"
        );

        self.resources.push((name.to_string(), resource));
        return Ok(());
    }

    pub fn declare_output(
        &mut self,
        name: &str,
        description: Option<&str>,
        value: impl Into<Expr>,
    ) -> Result<(), Error> {
        validate_name(name)?;
        if self.outputs.iter().any(|o| o.name == name) {
            return Err(duplicate("output", name));
        }
        debug!(output = name, "declare output");

        self.outputs.push(Output {
            name: name.to_string(),
            description: description.map(String::from),
            value: value.into(),
        });
        return Ok(());
    }

    pub fn render(&self) -> Result<String, Error> {
        self.render_as(Format::Yaml)
    }

    pub fn render_as(&self, format: Format) -> Result<String, Error> {
        let text = match format {
            Format::Yaml => self.render_yaml()?,
            Format::Json => serde_json::to_string_pretty(&self.to_value()?)
                .map(|mut text| {
                    text.push('\n');
                    text
                })
                .map_err(|error| Error::Serialization(error.to_string()))?,
        };
        info!(
            parameters = self.parameters.len(),
            mappings = self.mappings.len(),
            resources = self.resources.len(),
            outputs = self.outputs.len(),
            ?format,
            "rendered template"
        );
        return Ok(text);
    }

    // The version must stay a quoted string; YAML 1.1 readers load a bare
    // `2010-09-09` as a date.
    fn render_yaml(&self) -> Result<String, Error> {
        let mut text = format!("AWSTemplateFormatVersion: '{}'\n", FORMAT_VERSION);
        let body = self.body()?;
        if !body.is_empty() {
            let body = serde_yaml::to_string(&Value::Mapping(body))
                .map_err(|error| Error::Serialization(error.to_string()))?;
            text.push_str(&body);
        }
        return Ok(text);
    }

    pub fn to_value(&self) -> Result<Value, Error> {
        let mut document = Mapping::new();
        document.insert(key("AWSTemplateFormatVersion"), key(FORMAT_VERSION));
        for (name, section) in self.body()? {
            document.insert(name, section);
        }
        return Ok(Value::Mapping(document));
    }

    fn body(&self) -> Result<Mapping, Error> {
        let mut document = Mapping::new();
        if let Some(description) = &self.description {
            document.insert(key("Description"), key(description));
        }

        if !self.parameters.is_empty() {
            let mut section = Mapping::new();
            for parameter in &self.parameters {
                let mut entry = Mapping::new();
                entry.insert(key("Description"), key(&parameter.description));
                entry.insert(key("Type"), key(parameter.kind.as_str()));
                if let Some(default) = &parameter.default {
                    entry.insert(key("Default"), key(default));
                }
                section.insert(key(&parameter.name), Value::Mapping(entry));
            }
            document.insert(key("Parameters"), Value::Mapping(section));
        }

        if !self.mappings.is_empty() {
            let mut section = Mapping::new();
            for table in &self.mappings {
                let mut entries = Mapping::new();
                for (top, attributes) in &table.entries {
                    let mut values = Mapping::new();
                    for (name, value) in attributes {
                        values.insert(key(name), key(value));
                    }
                    entries.insert(key(top), Value::Mapping(values));
                }
                section.insert(key(&table.name), Value::Mapping(entries));
            }
            document.insert(key("Mappings"), Value::Mapping(section));
        }

        if !self.resources.is_empty() {
            let mut section = Mapping::new();
            for (name, resource) in &self.resources {
                section.insert(key(name), self.resource_value(resource)?);
            }
            document.insert(key("Resources"), Value::Mapping(section));
        }

        if !self.outputs.is_empty() {
            let mut section = Mapping::new();
            for output in &self.outputs {
                let mut entry = Mapping::new();
                if let Some(description) = &output.description {
                    entry.insert(key("Description"), key(description));
                }
                entry.insert(key("Value"), self.resolve(&output.value)?);
                section.insert(key(&output.name), Value::Mapping(entry));
            }
            document.insert(key("Outputs"), Value::Mapping(section));
        }

        return Ok(document);
    }

    fn resource_value(&self, resource: &Resource) -> Result<Value, Error> {
        let mut entry = Mapping::new();
        entry.insert(key("Type"), key(resource.kind().type_name()));

        if !resource.depends_on.is_empty() {
            let mut targets = Vec::new();
            for target in &resource.depends_on {
                if !self.has_resource(target) {
                    return Err(unknown("resource", target));
                }
                targets.push(key(target));
            }
            entry.insert(key("DependsOn"), Value::Sequence(targets));
        }

        if let Some(init) = &resource.metadata {
            entry.insert(key("Metadata"), self.resolve(&init.to_metadata())?);
        }

        let attributes = resource.properties.attributes();
        if !attributes.is_empty() {
            let mut properties = Mapping::new();
            for (name, value) in &attributes {
                properties.insert(key(name), self.resolve(value)?);
            }
            entry.insert(key("Properties"), Value::Mapping(properties));
        }

        return Ok(Value::Mapping(entry));
    }

    fn resolve(&self, expr: &Expr) -> Result<Value, Error> {
        let value = match expr {
            Expr::Str(value) => key(value),
            Expr::Int(value) => Value::Number((*value).into()),
            Expr::Bool(value) => Value::Bool(*value),
            Expr::List(items) => Value::Sequence(self.resolve_all(items)?),
            Expr::Object(fields) => {
                let mut object = Mapping::new();
                for (name, value) in fields {
                    object.insert(key(name), self.resolve(value)?);
                }
                Value::Mapping(object)
            }
            Expr::ParamRef(name) => {
                if !self.parameters.iter().any(|p| &p.name == name) {
                    return Err(unknown("parameter", name));
                }
                intrinsic("Ref", key(name))
            }
            Expr::ResourceRef(name) => {
                if !self.has_resource(name) {
                    return Err(unknown("resource", name));
                }
                intrinsic("Ref", key(name))
            }
            Expr::Pseudo(pseudo) => intrinsic("Ref", key(pseudo.as_str())),
            Expr::MapLookup { table, top, second } => {
                self.check_lookup(table, top, second)?;
                let args = vec![key(table), self.resolve(top)?, self.resolve(second)?];
                intrinsic("Fn::FindInMap", Value::Sequence(args))
            }
            Expr::AttrRef {
                resource,
                attribute,
            } => {
                if !self.has_resource(resource) {
                    return Err(unknown("resource", resource));
                }
                intrinsic(
                    "Fn::GetAtt",
                    Value::Sequence(vec![key(resource), key(attribute)]),
                )
            }
            Expr::Join { separator, parts } => {
                let parts = Value::Sequence(self.resolve_all(parts)?);
                intrinsic("Fn::Join", Value::Sequence(vec![key(separator), parts]))
            }
            Expr::Base64(inner) => intrinsic("Fn::Base64", self.resolve(inner)?),
        };
        return Ok(value);
    }

    fn resolve_all(&self, items: &[Expr]) -> Result<Vec<Value>, Error> {
        items.iter().map(|item| self.resolve(item)).collect()
    }

    fn check_lookup(&self, table: &str, top: &Expr, second: &Expr) -> Result<(), Error> {
        let mapping = match self.mappings.iter().find(|m| m.name == table) {
            Some(mapping) => mapping,
            None => return Err(unknown("mapping", table)),
        };

        let top = match top {
            Expr::Str(top) => {
                if !mapping.has_top(top) {
                    return Err(unknown("mapping key", &format!("{}.{}", table, top)));
                }
                Some(top.as_str())
            }
            _ => None,
        };
        if let Expr::Str(second) = second {
            if !mapping.has_second(top, second) {
                return Err(unknown("mapping key", &format!("{}.{}", table, second)));
            }
        }
        return Ok(());
    }

    fn has_resource(&self, name: &str) -> bool {
        self.resources.iter().any(|(existing, _)| existing == name)
    }

    // Parameters and resources share one namespace since `Ref` addresses both.
    fn is_ref_target(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p.name == name) || self.has_resource(name)
    }
}

fn key(value: &str) -> Value {
    Value::String(value.to_string())
}

fn intrinsic(name: &str, argument: Value) -> Value {
    let mut call = Mapping::new();
    call.insert(key(name), argument);
    Value::Mapping(call)
}

fn duplicate(kind: &'static str, name: &str) -> Error {
    Error::DuplicateName {
        kind,
        name: name.to_string(),
    }
}

fn unknown(kind: &'static str, name: &str) -> Error {
    Error::UnknownReference {
        kind,
        name: name.to_string(),
    }
}

fn validate_name(name: &str) -> Result<(), Error> {
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(Error::InvalidName(name.to_string()));
    }
    return Ok(());
}

#[cfg(test)]
mod tests {
    use serde_yaml::Value;

    use super::Error;
    use super::Format;
    use super::ParameterType;
    use super::Template;
    use crate::expr::{Expr, Pseudo};
    use crate::resources::{Bucket, LaunchConfiguration, Resource};

    fn minimal() -> Template {
        let mut template = Template::new();
        template
            .declare_parameter("Region", "Deploy region", ParameterType::String, Some("us-east-1"))
            .unwrap();
        template
            .declare_mapping("RegionMap", [("us-east-1", [("AMI", "ami-123")])])
            .unwrap();
        template
            .declare_resource(
                "Server",
                LaunchConfiguration {
                    image_id: Expr::find_in_map("RegionMap", Expr::param("Region"), "AMI"),
                    instance_type: Expr::from("t3.micro"),
                    key_name: None,
                    security_groups: Vec::new(),
                    user_data: None,
                },
            )
            .unwrap();
        template
    }

    #[test]
    fn sections_follow_declaration_kinds() {
        let text = minimal().render().unwrap();

        let parameters = text.find("Parameters:").unwrap();
        let mappings = text.find("Mappings:").unwrap();
        let resources = text.find("Resources:").unwrap();
        assert!(parameters < mappings);
        assert!(mappings < resources);
        assert!(text.starts_with("AWSTemplateFormatVersion:"));
    }

    #[test]
    fn render_is_deterministic() {
        assert_eq!(minimal().render().unwrap(), minimal().render().unwrap());
        assert_eq!(
            minimal().render_as(Format::Json).unwrap(),
            minimal().render_as(Format::Json).unwrap()
        );
    }

    #[test]
    fn resolves_find_in_map() {
        let document = minimal().to_value().unwrap();

        let image = &document["Resources"]["Server"]["Properties"]["ImageId"];
        let args = image["Fn::FindInMap"].as_sequence().unwrap();
        assert_eq!(Value::from("RegionMap"), args[0]);
        assert_eq!(Value::from("Region"), args[1]["Ref"]);
        assert_eq!(Value::from("AMI"), args[2]);
    }

    #[test]
    fn unknown_parameter_fails_at_render_time() {
        let mut template = Template::new();
        let result = template.declare_resource(
            "Bucket1",
            Bucket {
                bucket_name: Some(Expr::join("", vec![Expr::from("prefix-"), Expr::param("Suffix")])),
                access_control: None,
            },
        );
        assert_eq!(Ok(()), result);

        assert_eq!(
            Err(Error::UnknownReference {
                kind: "parameter",
                name: String::from("Suffix"),
            }),
            template.render()
        );
    }

    #[test]
    fn forward_resource_references_resolve() {
        let mut template = Template::new();
        template
            .declare_resource(
                "First",
                Resource::from(Bucket {
                    bucket_name: Some(Expr::get_att("Second", "Arn")),
                    access_control: None,
                })
                .depends_on("Second"),
            )
            .unwrap();
        template
            .declare_resource("Second", Bucket::default())
            .unwrap();

        let document = template.to_value().unwrap();
        assert_eq!(
            Value::from("Second"),
            document["Resources"]["First"]["DependsOn"][0]
        );
    }

    #[test]
    fn unknown_depends_on_target() {
        let mut template = Template::new();
        template
            .declare_resource("First", Resource::from(Bucket::default()).depends_on("Ghost"))
            .unwrap();

        assert_eq!(
            Err(Error::UnknownReference {
                kind: "resource",
                name: String::from("Ghost"),
            }),
            template.render()
        );
    }

    #[test]
    fn parameters_and_resources_share_names() {
        let mut template = Template::new();
        template
            .declare_parameter("Thing", "", ParameterType::String, None)
            .unwrap();

        assert_eq!(
            Err(Error::DuplicateName {
                kind: "resource",
                name: String::from("Thing"),
            }),
            template.declare_resource("Thing", Bucket::default())
        );
    }

    #[test]
    fn yaml_quotes_format_version() {
        let text = minimal().render().unwrap();

        assert_eq!(
            Some("AWSTemplateFormatVersion: '2010-09-09'"),
            text.lines().next()
        );
        assert_eq!(1, text.matches("AWSTemplateFormatVersion").count());

        let parsed: Value = serde_yaml::from_str(&text).unwrap();
        assert_eq!(Value::from("2010-09-09"), parsed["AWSTemplateFormatVersion"]);
        assert_eq!(minimal().to_value().unwrap(), parsed);
    }

    #[test]
    fn empty_template_renders_header_only() {
        assert_eq!(
            "AWSTemplateFormatVersion: '2010-09-09'\n",
            Template::new().render().unwrap()
        );
    }

    #[test]
    fn duplicate_parameter() {
        let mut template = Template::new();
        template
            .declare_parameter("A", "first", ParameterType::String, None)
            .unwrap();

        assert_eq!(
            Err(Error::DuplicateName {
                kind: "parameter",
                name: String::from("A"),
            }),
            template.declare_parameter("A", "second", ParameterType::Number, Some("1"))
        );
        assert_eq!(1, template.parameters.len());
    }

    #[test]
    fn rejects_empty_mappings() {
        let mut template = Template::new();
        let no_entries: Vec<(&str, Vec<(&str, &str)>)> = Vec::new();

        assert_eq!(
            Err(Error::EmptyMapping(String::from("RegionMap"))),
            template.declare_mapping("RegionMap", no_entries)
        );
        assert_eq!(
            Err(Error::EmptyMapping(String::from("RegionMap.us-east-1"))),
            template.declare_mapping("RegionMap", vec![("us-east-1", Vec::<(&str, &str)>::new())])
        );
        assert_eq!(true, template.mappings.is_empty());
    }

    #[test]
    fn duplicate_outputs_and_mappings() {
        let mut template = Template::new();
        template.declare_output("Out", None, "a").unwrap();
        template
            .declare_mapping("Map", [("k", [("a", "b")])])
            .unwrap();

        assert_eq!(
            Err(Error::DuplicateName {
                kind: "output",
                name: String::from("Out"),
            }),
            template.declare_output("Out", None, "b")
        );
        assert_eq!(
            Err(Error::DuplicateName {
                kind: "mapping",
                name: String::from("Map"),
            }),
            template.declare_mapping("Map", [("k", [("a", "b")])])
        );
    }

    #[test]
    fn duplicate_mapping_keys() {
        let mut template = Template::new();

        let result = template.declare_mapping(
            "RegionMap",
            [("us-east-1", [("AMI", "a")]), ("us-east-1", [("AMI", "b")])],
        );

        assert_eq!(
            Err(Error::DuplicateName {
                kind: "mapping key",
                name: String::from("RegionMap.us-east-1"),
            }),
            result
        );
    }

    #[test]
    fn unknown_mapping_key() {
        let mut template = minimal();
        template
            .declare_output(
                "Image",
                None,
                Expr::find_in_map("RegionMap", Pseudo::Region, "Kernel"),
            )
            .unwrap();

        assert_eq!(
            Err(Error::UnknownReference {
                kind: "mapping key",
                name: String::from("RegionMap.Kernel"),
            }),
            template.render()
        );
    }

    #[test]
    fn rejects_non_alphanumeric_names() {
        let mut template = Template::new();

        assert_eq!(
            Err(Error::InvalidName(String::from("my-bucket"))),
            template.declare_resource("my-bucket", Bucket::default())
        );
        assert_eq!(
            Err(Error::InvalidName(String::new())),
            template.declare_output("", None, "x")
        );
    }

    #[test]
    fn json_keeps_declaration_order() {
        let text = minimal().render_as(Format::Json).unwrap();

        let parameters = text.find("\"Parameters\"").unwrap();
        let mappings = text.find("\"Mappings\"").unwrap();
        let resources = text.find("\"Resources\"").unwrap();
        assert!(parameters < mappings && mappings < resources);
        assert!(text.contains("\"Ref\": \"Region\""));
    }
}
