#[cfg(test)]
pub mod memory;
pub mod s3;

use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use aws_sdk_s3::config::Region;
use common::config::Settings;

#[derive(Clone, Debug, Default)]
pub struct S3Config {
    /// Custom endpoint, e.g. a MinIO deployment. Path-style addressing is
    /// used whenever this is set.
    pub endpoint: Option<String>,
    pub region: Option<String>,
}

/// Builds S3 clients from the default AWS credential chain (profile,
/// environment or instance role) plus the optional overrides in [`S3Config`].
#[derive(Clone, Debug)]
pub struct S3Manager {
    pub config: S3Config,
}

impl S3Manager {
    pub fn new(config: S3Config) -> Self {
        Self { config }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(S3Config {
            endpoint: settings.s3_endpoint.clone(),
            region: settings.s3_region.clone(),
        })
    }

    pub async fn get_client(&self) -> S3Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.config.region {
            loader = loader.region(Region::new(region.clone()));
        }
        let sdk_config = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint) = &self.config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        S3Client::from_conf(builder.build())
    }
}
