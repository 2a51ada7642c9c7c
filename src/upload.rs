//! Upload Dispatcher
//!
//! The core hands finished batch files to an [`Uploader`]; the S3
//! implementation wraps the async AWS SDK behind a synchronous facade so the
//! run loop stays strictly sequential. Transfer retries are whatever the SDK
//! itself does; the core never retries.

use std::future::Future;
use std::path::Path;

use aws_sdk_s3::primitives::ByteStream;

use crate::config::TargetConfig;
use crate::error::{Result, TargetError};

/// Seam between the run loop and object storage. On success the caller
/// deletes the local file.
pub trait Uploader {
    fn upload(&self, local_path: &Path, bucket: &str, key_prefix: &str) -> Result<()>;
}

/// S3 uploader: object key is `<key_prefix><file_name>`.
pub struct S3Uploader {
    client: aws_sdk_s3::Client,
}

impl S3Uploader {
    /// Build a client from the default AWS config chain, honoring the
    /// optional static credentials and endpoint override in the config.
    pub fn new(config: &TargetConfig) -> Result<Self> {
        let client = block_on(client_from_config(config))?;
        Ok(Self { client })
    }
}

impl Uploader for S3Uploader {
    fn upload(&self, local_path: &Path, bucket: &str, key_prefix: &str) -> Result<()> {
        let upload_err = |reason: String| TargetError::Upload {
            path: local_path.to_path_buf(),
            reason,
        };

        let file_name = local_path
            .file_name()
            .and_then(|s| s.to_str())
            .ok_or_else(|| upload_err("batch file has no usable name".to_string()))?;
        let key = format!("{key_prefix}{file_name}");

        block_on(async {
            let body = ByteStream::from_path(local_path)
                .await
                .map_err(|e| upload_err(format!("unable to read batch file: {e:?}")))?;
            self.client
                .put_object()
                .bucket(bucket)
                .key(&key)
                .body(body)
                .send()
                .await
                .map_err(|e| upload_err(format!("s3 put_object failed: {e:?}")))?;
            Ok(())
        })?
    }
}

async fn client_from_config(config: &TargetConfig) -> aws_sdk_s3::Client {
    let cfg = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;

    let mut builder = aws_sdk_s3::config::Builder::from(&cfg);
    if let (Some(id), Some(secret)) = (&config.aws_access_key_id, &config.aws_secret_access_key) {
        builder = builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
            id.clone(),
            secret.clone(),
            None,
            None,
            "target-config",
        ));
    }
    if let Some(url) = &config.aws_endpoint_url {
        builder = builder.endpoint_url(url.clone()).force_path_style(true);
    }

    aws_sdk_s3::Client::from_conf(builder.build())
}

/// Drive one future to completion on a fresh current-thread runtime. The
/// whole pipeline is synchronous; only the SDK calls are async.
fn block_on<Fut>(fut: Fut) -> Result<Fut::Output>
where
    Fut: Future,
{
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(rt.block_on(fut))
}
