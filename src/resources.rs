use crate::bootstrap::Init;
use crate::expr::Expr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Bucket,
    SecurityGroup,
    LaunchConfiguration,
    AutoScalingGroup,
}

impl ResourceKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            ResourceKind::Bucket => "AWS::S3::Bucket",
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::LaunchConfiguration => "AWS::AutoScaling::LaunchConfiguration",
            ResourceKind::AutoScalingGroup => "AWS::AutoScaling::AutoScalingGroup",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessControl {
    Private,
    PublicRead,
    PublicReadWrite,
    AuthenticatedRead,
    LogDeliveryWrite,
    BucketOwnerRead,
    BucketOwnerFullControl,
}

impl AccessControl {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessControl::Private => "Private",
            AccessControl::PublicRead => "PublicRead",
            AccessControl::PublicReadWrite => "PublicReadWrite",
            AccessControl::AuthenticatedRead => "AuthenticatedRead",
            AccessControl::LogDeliveryWrite => "LogDeliveryWrite",
            AccessControl::BucketOwnerRead => "BucketOwnerRead",
            AccessControl::BucketOwnerFullControl => "BucketOwnerFullControl",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bucket {
    pub bucket_name: Option<Expr>,
    pub access_control: Option<AccessControl>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub description: Option<String>,
    pub ip_protocol: String,
    pub from_port: u16,
    pub to_port: u16,
    pub cidr_ip: Expr,
}

impl Rule {
    pub fn tcp(from_port: u16, to_port: u16, cidr_ip: impl Into<Expr>) -> Self {
        Self {
            description: None,
            ip_protocol: String::from("tcp"),
            from_port,
            to_port,
            cidr_ip: cidr_ip.into(),
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    fn to_expr(&self) -> Expr {
        let mut fields = Vec::new();
        if let Some(description) = &self.description {
            fields.push((String::from("Description"), Expr::str(description)));
        }
        fields.extend([
            (String::from("ToPort"), Expr::str(self.to_port.to_string())),
            (String::from("FromPort"), Expr::str(self.from_port.to_string())),
            (String::from("IpProtocol"), Expr::str(&self.ip_protocol)),
            (String::from("CidrIp"), self.cidr_ip.clone()),
        ]);
        Expr::Object(fields)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SecurityGroup {
    pub group_description: String,
    pub group_name: Option<String>,
    pub vpc_id: Option<Expr>,
    pub ingress: Vec<Rule>,
    pub egress: Vec<Rule>,
}

impl SecurityGroup {
    pub fn new(group_description: impl Into<String>) -> Self {
        Self {
            group_description: group_description.into(),
            group_name: None,
            vpc_id: None,
            ingress: Vec::new(),
            egress: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LaunchConfiguration {
    pub image_id: Expr,
    pub instance_type: Expr,
    pub key_name: Option<Expr>,
    pub security_groups: Vec<Expr>,
    pub user_data: Option<Expr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckType {
    Ec2,
    Elb,
}

impl HealthCheckType {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthCheckType::Ec2 => "EC2",
            HealthCheckType::Elb => "ELB",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AutoScalingGroup {
    pub min_size: u32,
    pub max_size: u32,
    pub desired_capacity: Option<u32>,
    pub launch_configuration_name: Option<Expr>,
    pub availability_zones: Vec<Expr>,
    pub health_check_type: Option<HealthCheckType>,
    pub health_check_grace_period: Option<u32>,
}

impl AutoScalingGroup {
    pub fn new(min_size: u32, max_size: u32) -> Self {
        Self {
            min_size,
            max_size,
            desired_capacity: None,
            launch_configuration_name: None,
            availability_zones: Vec::new(),
            health_check_type: None,
            health_check_grace_period: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Properties {
    Bucket(Bucket),
    SecurityGroup(SecurityGroup),
    LaunchConfiguration(LaunchConfiguration),
    AutoScalingGroup(AutoScalingGroup),
}

impl Properties {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Properties::Bucket(_) => ResourceKind::Bucket,
            Properties::SecurityGroup(_) => ResourceKind::SecurityGroup,
            Properties::LaunchConfiguration(_) => ResourceKind::LaunchConfiguration,
            Properties::AutoScalingGroup(_) => ResourceKind::AutoScalingGroup,
        }
    }

    pub fn attributes(&self) -> Vec<(&'static str, Expr)> {
        let mut attributes = Vec::new();
        match self {
            Properties::Bucket(bucket) => {
                push_opt(&mut attributes, "BucketName", bucket.bucket_name.clone());
                push_opt(
                    &mut attributes,
                    "AccessControl",
                    bucket.access_control.map(|acl| Expr::from(acl.as_str())),
                );
            }
            Properties::SecurityGroup(group) => {
                push_opt(&mut attributes, "VpcId", group.vpc_id.clone());
                attributes.push(("GroupDescription", Expr::str(&group.group_description)));
                push_opt(
                    &mut attributes,
                    "GroupName",
                    group.group_name.as_ref().map(Expr::str),
                );
                push_list(
                    &mut attributes,
                    "SecurityGroupIngress",
                    group.ingress.iter().map(Rule::to_expr).collect(),
                );
                push_list(
                    &mut attributes,
                    "SecurityGroupEgress",
                    group.egress.iter().map(Rule::to_expr).collect(),
                );
            }
            Properties::LaunchConfiguration(config) => {
                push_opt(&mut attributes, "UserData", config.user_data.clone());
                attributes.push(("ImageId", config.image_id.clone()));
                push_opt(&mut attributes, "KeyName", config.key_name.clone());
                push_list(
                    &mut attributes,
                    "SecurityGroups",
                    config.security_groups.clone(),
                );
                attributes.push(("InstanceType", config.instance_type.clone()));
            }
            Properties::AutoScalingGroup(group) => {
                push_opt(
                    &mut attributes,
                    "DesiredCapacity",
                    group.desired_capacity.map(|n| Expr::str(n.to_string())),
                );
                push_opt(
                    &mut attributes,
                    "LaunchConfigurationName",
                    group.launch_configuration_name.clone(),
                );
                attributes.push(("MinSize", Expr::str(group.min_size.to_string())));
                attributes.push(("MaxSize", Expr::str(group.max_size.to_string())));
                push_list(
                    &mut attributes,
                    "AvailabilityZones",
                    group.availability_zones.clone(),
                );
                push_opt(
                    &mut attributes,
                    "HealthCheckType",
                    group.health_check_type.map(|t| Expr::from(t.as_str())),
                );
                push_opt(
                    &mut attributes,
                    "HealthCheckGracePeriod",
                    group.health_check_grace_period.map(|n| Expr::Int(n as i64)),
                );
            }
        }
        attributes
    }
}

fn push_opt(attributes: &mut Vec<(&'static str, Expr)>, key: &'static str, value: Option<Expr>) {
    if let Some(value) = value {
        attributes.push((key, value));
    }
}

fn push_list(attributes: &mut Vec<(&'static str, Expr)>, key: &'static str, items: Vec<Expr>) {
    if !items.is_empty() {
        attributes.push((key, Expr::List(items)));
    }
}

/// A declared resource: its properties plus the template-level extras the
/// provisioning engine reads beside them.
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub properties: Properties,
    pub metadata: Option<Init>,
    pub depends_on: Vec<String>,
}

impl Resource {
    pub fn new(properties: Properties) -> Self {
        Self {
            properties,
            metadata: None,
            depends_on: Vec::new(),
        }
    }

    pub fn metadata(mut self, init: Init) -> Self {
        self.metadata = Some(init);
        self
    }

    pub fn depends_on(mut self, resource: impl Into<String>) -> Self {
        self.depends_on.push(resource.into());
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.properties.kind()
    }
}

impl From<Bucket> for Resource {
    fn from(bucket: Bucket) -> Self {
        Resource::new(Properties::Bucket(bucket))
    }
}

impl From<SecurityGroup> for Resource {
    fn from(group: SecurityGroup) -> Self {
        Resource::new(Properties::SecurityGroup(group))
    }
}

impl From<LaunchConfiguration> for Resource {
    fn from(config: LaunchConfiguration) -> Self {
        Resource::new(Properties::LaunchConfiguration(config))
    }
}

impl From<AutoScalingGroup> for Resource {
    fn from(group: AutoScalingGroup) -> Self {
        Resource::new(Properties::AutoScalingGroup(group))
    }
}
