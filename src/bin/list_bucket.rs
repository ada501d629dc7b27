use aws_config::{meta::region::RegionProviderChain, BehaviorVersion, Region};
use clap::Parser;
use list_bucket::{
    credentials::StsRoleAssumer,
    lister::{
        BucketLister, BucketListerArgs, ListTarget, DEFAULT_BUCKET, DEFAULT_ROLE_ARN,
        DEFAULT_SESSION_NAME,
    },
    listing::S3ObjectLister,
    output::OutputFormat,
};
use tracing::{debug, Level};

/// Assumes an IAM role and prints the keys of the objects in a bucket.
#[derive(Debug, Parser)]
struct Args {
    /// ARN of the role to assume.
    #[arg(long, env = "LIST_BUCKET_ROLE_ARN", default_value = DEFAULT_ROLE_ARN)]
    role_arn: String,

    #[arg(long, env = "LIST_BUCKET_SESSION_NAME", default_value = DEFAULT_SESSION_NAME)]
    session_name: String,

    /// The name of the bucket.
    #[arg(long, env = "LIST_BUCKET_BUCKET", default_value = DEFAULT_BUCKET)]
    bucket: String,

    /// Only list keys starting with this prefix.
    #[arg(long, env = "LIST_BUCKET_PREFIX")]
    prefix: Option<String>,

    /// Lifetime of the assumed-role session.
    #[arg(long, env = "LIST_BUCKET_DURATION_SECONDS")]
    duration_seconds: Option<i32>,

    /// The AWS Region. Falls back to the default provider chain, then us-east-1.
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Custom endpoint, e.g. for LocalStack.
    #[arg(long, env = "AWS_ENDPOINT_URL")]
    endpoint_url: Option<String>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Keys)]
    format: OutputFormat,

    /// Log SDK and request details to stderr.
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn target(&self) -> ListTarget {
        ListTarget {
            role_arn: self.role_arn.clone(),
            session_name: self.session_name.clone(),
            bucket: self.bucket.clone(),
            prefix: self.prefix.clone(),
            duration_seconds: self.duration_seconds,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    let region_provider = RegionProviderChain::first_try(args.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(Region::new("us-east-1"));
    let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
    if let Some(endpoint) = &args.endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }
    let shared_config = loader.load().await;
    debug!("region {:?}", shared_config.region());

    let lister = BucketLister::new(BucketListerArgs {
        assumer: StsRoleAssumer::new(&shared_config),
        lister: S3ObjectLister::new(shared_config.clone()),
        format: args.format,
    });

    lister.run(&args.target(), &mut std::io::stdout()).await?;
    Ok(())
}
