use serde::{Deserialize, Serialize};
use std::{collections::HashSet, fs, io, path::PathBuf};
use tracing::debug;
use validator::{Validate, ValidationError};

use crate::template::Format;

pub const DEFAULT_PATH: &str = "./plex-cloud.config.yaml";

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum Error {
    #[error("File {0} not found")]
    FileNotFound(String),

    #[error("Parsing error: {0}")]
    ParsingError(String),

    #[error("Validation errors: {0}")]
    ValidationError(String),

    #[error("Unknown error occurred: {0}")]
    Unknown(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct ConfigFile {
    pub location: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegionImage {
    pub region: String,
    pub ami: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
#[serde(default)]
pub struct Config {
    #[validate(custom = "validate_output_file")]
    pub output: ConfigFile,

    pub description: Option<String>,

    #[validate(length(min = 1))]
    pub instance_type: String,

    #[validate(length(min = 1))]
    pub availability_zones: Vec<String>,

    #[validate(length(min = 1), custom = "validate_region_images")]
    pub region_images: Vec<RegionImage>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output: ConfigFile {
                location: PathBuf::from("plex-cloud.yaml"),
            },
            description: None,
            instance_type: String::from("t3.micro"),
            availability_zones: vec![String::from("us-east-1a"), String::from("us-east-1b")],
            region_images: vec![RegionImage {
                region: String::from("us-east-1"),
                ami: String::from("ami-9887c6e7"),
            }],
        }
    }
}

impl Config {
    pub fn format(&self) -> Format {
        match self.output.location.extension() {
            Some(extension) if extension == "json" => Format::Json,
            _ => Format::Yaml,
        }
    }
}

pub fn parse(path: &PathBuf) -> Result<Config, Error> {
    let contents = match fs::read_to_string(path) {
        Ok(raw_contents) => Ok(raw_contents),
        Err(error) => match error.kind() {
            io::ErrorKind::NotFound => Err(Error::FileNotFound(path.display().to_string())),
            _ => Err(Error::Unknown(error.to_string())),
        },
    }?;

    let config: Config = match serde_yaml::from_str(&contents) {
        Ok(data) => Ok(data),
        Err(error) => Err(Error::ParsingError(error.to_string())),
    }?;

    match config.validate() {
        Ok(_) => (),
        Err(error) => return Err(Error::ValidationError(error.to_string())),
    }

    return Ok(config);
}

/// Like `parse`, but a missing file means the defaults.
pub fn load(path: &PathBuf) -> Result<Config, Error> {
    match parse(path) {
        Err(Error::FileNotFound(location)) => {
            debug!(%location, "no config file, using defaults");
            Ok(Config::default())
        }
        result => result,
    }
}

fn validate_output_file(output_file: &ConfigFile) -> Result<(), ValidationError> {
    let file_extension = match output_file.location.extension() {
        Some(extension) => extension,
        None => {
            return Err(ValidationError::new(
                "Unable to parse the extension of the output file location",
            ))
        }
    };
    if file_extension != "yaml" && file_extension != "yml" && file_extension != "json" {
        return Err(ValidationError::new(
            "The output file location has to end with `.yaml`, `.yml` or `.json`",
        ));
    }

    return Ok(());
}

fn validate_region_images(region_images: &Vec<RegionImage>) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();
    for image in region_images {
        if image.region.is_empty() || image.ami.is_empty() {
            return Err(ValidationError::new(
                "Region images need both a region and an AMI",
            ));
        }
        if !seen.insert(image.region.as_str()) {
            return Err(ValidationError::new(
                "Each region can only be mapped to one image",
            ));
        }
    }

    return Ok(());
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::io::Write;
    use std::path::PathBuf;

    use super::load;
    use super::parse;
    use super::Config;
    use super::ConfigFile;
    use super::Error;
    use super::RegionImage;
    use crate::template::Format;
    use tempfile::tempdir;

    fn write_config(config: &Config) -> (tempfile::TempDir, PathBuf) {
        let config_contents = serde_yaml::to_string(config).unwrap();

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "{}", config_contents).unwrap();
        (dir, file_path)
    }

    #[test]
    fn file_does_not_exist() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let result = parse(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::FileNotFound(_) => {}
            _ => panic!("Expected `FileNotFound` error"),
        }
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let config = load(&file_path).unwrap();
        assert_eq!(Config::default(), config);
        assert_eq!(Format::Yaml, config.format());
    }

    #[test]
    fn file_wrong_format() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "Not yaml").unwrap();

        let result = load(&file_path);
        assert_eq!(true, result.is_err());
        match result.err().unwrap() {
            Error::ParsingError(_) => {}
            _ => panic!("Expected `ParsingError` error"),
        }
    }

    #[test]
    fn file_wrong_output_extension() {
        let config = Config {
            output: ConfigFile {
                location: PathBuf::from("template.txt"),
            },
            ..Config::default()
        };
        let (_dir, file_path) = write_config(&config);

        let result = parse(&file_path);
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn file_duplicate_region() {
        let image = RegionImage {
            region: String::from("us-east-1"),
            ami: String::from("ami-1"),
        };
        let config = Config {
            region_images: vec![image.clone(), image],
            ..Config::default()
        };
        let (_dir, file_path) = write_config(&config);

        let result = parse(&file_path);
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn file_region_without_image() {
        let config = Config {
            region_images: vec![RegionImage {
                region: String::from("us-east-1"),
                ami: String::new(),
            }],
            ..Config::default()
        };
        let (_dir, file_path) = write_config(&config);

        let result = parse(&file_path);
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn file_without_availability_zones() {
        let config = Config {
            availability_zones: Vec::new(),
            ..Config::default()
        };
        let (_dir, file_path) = write_config(&config);

        let result = parse(&file_path);
        match result.err().unwrap() {
            Error::ValidationError(_) => {}
            _ => panic!("Expected `ValidationError` error"),
        }
    }

    #[test]
    fn parses_the_config() {
        let config = Config {
            output: ConfigFile {
                location: PathBuf::from("out/plex.json"),
            },
            description: Some(String::from("Plex")),
            ..Config::default()
        };
        let (_dir, file_path) = write_config(&config);

        let result = parse(&file_path).unwrap();
        assert_eq!(config, result);
        assert_eq!(Format::Json, result.format());
    }

    #[test]
    fn partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("config.yaml");

        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "instance_type: t3.small").unwrap();

        let config = parse(&file_path).unwrap();
        assert_eq!("t3.small", config.instance_type);
        assert_eq!(Config::default().region_images, config.region_images);
    }
}
