//! The Plex media server stack: a private media bucket, a security group, and
//! a single-instance scaling group that installs Plex on boot.

use crate::bootstrap::{Command, Init, Phase};
use crate::config::Config;
use crate::expr::{Expr, Pseudo};
use crate::resources::{
    AccessControl, AutoScalingGroup, Bucket, HealthCheckType, LaunchConfiguration, Resource, Rule,
    SecurityGroup,
};
use crate::template::{Error, ParameterType, Template};

pub const LAUNCH_CONFIGURATION: &str = "LaunchConfiguration";

const AGENT_INSTALL: [&str; 3] = [
    "yum install epel-release",
    "yum -y install python-pip",
    "/usr/bin/easy_install --script-dir /opt/aws/bin https://s3.amazonaws.com/cloudformation-examples/aws-cfn-bootstrap-latest.tar.gz",
];

pub fn build(config: &Config) -> Result<Template, Error> {
    let mut template = Template::new();
    if let Some(description) = &config.description {
        template.set_description(description);
    }

    template.declare_parameter(
        "SshIp",
        "Address to SSH from. Defaults to local host.",
        ParameterType::String,
        Some("127.0.0.1/32"),
    )?;
    template.declare_parameter(
        "VpcId",
        "VpcId you'd like to deploy to.",
        ParameterType::VpcId,
        None,
    )?;
    template.declare_parameter(
        "KeyName",
        "Name of an existing EC2 KeyPair to enable SSH access to the instance",
        ParameterType::String,
        None,
    )?;
    template.declare_parameter(
        "BucketNameSuffix",
        "Bucket names must be globally unique. Adds a suffix to bucket name.",
        ParameterType::String,
        None,
    )?;
    template.declare_parameter(
        "HostedZone",
        "Hosted zone for public route 53 record",
        ParameterType::String,
        Some("therealbenforce.com"),
    )?;

    template.declare_mapping(
        "RegionMap",
        config
            .region_images
            .iter()
            .map(|image| (image.region.as_str(), [("AMI", image.ami.as_str())])),
    )?;

    template.declare_resource(
        "S3Bucket",
        Bucket {
            bucket_name: Some(Expr::join(
                "",
                vec![Expr::from("plex-media-"), Expr::param("BucketNameSuffix")],
            )),
            access_control: Some(AccessControl::Private),
        },
    )?;

    template.declare_resource("PlexSecurityGroup", security_group())?;

    let init = bootstrap()?;
    let user_data = init.boot_script(&AGENT_INSTALL, LAUNCH_CONFIGURATION);
    template.declare_resource(
        LAUNCH_CONFIGURATION,
        Resource::from(LaunchConfiguration {
            image_id: Expr::find_in_map("RegionMap", Pseudo::Region, "AMI"),
            instance_type: Expr::str(&config.instance_type),
            key_name: Some(Expr::param("KeyName")),
            security_groups: vec![Expr::resource("PlexSecurityGroup")],
            user_data: Some(user_data),
        })
        .metadata(init),
    )?;

    let mut group = AutoScalingGroup::new(1, 1);
    group.desired_capacity = Some(1);
    group.launch_configuration_name = Some(Expr::resource(LAUNCH_CONFIGURATION));
    group.availability_zones = config.availability_zones.iter().map(Expr::str).collect();
    group.health_check_type = Some(HealthCheckType::Ec2);
    template.declare_resource("AutoscalingGroup", group)?;

    template.declare_output(
        "SampleOutput",
        Some("InstanceId of the newly created EC2 instance"),
        "SampleVal",
    )?;

    return Ok(template);
}

fn security_group() -> SecurityGroup {
    let mut group = SecurityGroup::new("Traffic to and from the plex server");
    group.group_name = Some(String::from("Plex"));
    group.vpc_id = Some(Expr::param("VpcId"));
    group.ingress = vec![
        Rule::tcp(32400, 32400, "0.0.0.0/0").description("Plex"),
        Rule::tcp(22, 22, Expr::param("SshIp")).description("SSH, change to your IP."),
    ];
    group.egress = vec![Rule::tcp(0, 65535, "0.0.0.0/0").description("Software downloads")];
    group
}

fn bootstrap() -> Result<Init, Error> {
    let packages = Phase::new("packages")
        .package("yum", "git")
        .package("yum", "wget")
        .package("yum", "unzip");

    let plex_install = Phase::new("plex_install")
        .command(
            Command::new(
                "01_download",
                "wget https://github.com/mrworf/plexupdate/archive/master.zip",
            )
            .cwd("/home/centos"),
        )?
        .command(Command::new("02_unzip", "unzip master.zip").cwd("/home/centos"))?
        .command(Command::new("03_become_root", "sudo su").cwd("/home/centos"))?
        .command(
            Command::new("04_run_mr_worf", "bash ./plexupdate.sh -a -p -s")
                .cwd("/home/centos/plexupdate-master"),
        )?;

    let signal = Phase::new("signal").command(
        Command::new("test", "echo \"$CFNTEST\" > text.txt")
            .env("CFNTEST", "I come from signal.")
            .cwd("~"),
    )?;

    let init = Init::new()
        .phase(packages)?
        .phase(plex_install)?
        .phase(signal)?
        .default_order(["packages", "plex_install", "signal"])?;
    return Ok(init);
}
