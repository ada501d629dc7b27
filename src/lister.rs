use std::io::Write;

use anyhow::Context;
use tracing::{debug, info};

use crate::{
    credentials::{AssumeRoleRequest, RoleAssumer},
    listing::ObjectLister,
    output::{write_entries, OutputFormat},
};

pub const DEFAULT_ROLE_ARN: &str = "arn:aws:s3:::releases.yugabyte.com/ybc/";
pub const DEFAULT_SESSION_NAME: &str = "AssumeRoleSession";
pub const DEFAULT_BUCKET: &str = "releases.yugabyte.com";

/// Which role to assume and which bucket to list with it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListTarget {
    pub role_arn: String,
    pub session_name: String,
    pub bucket: String,
    pub prefix: Option<String>,
    pub duration_seconds: Option<i32>,
}

impl Default for ListTarget {
    fn default() -> Self {
        Self {
            role_arn: DEFAULT_ROLE_ARN.to_owned(),
            session_name: DEFAULT_SESSION_NAME.to_owned(),
            bucket: DEFAULT_BUCKET.to_owned(),
            prefix: None,
            duration_seconds: None,
        }
    }
}

impl ListTarget {
    fn assume_role_request(&self) -> AssumeRoleRequest {
        AssumeRoleRequest {
            role_arn: self.role_arn.clone(),
            session_name: self.session_name.clone(),
            duration_seconds: self.duration_seconds,
        }
    }
}

pub struct BucketLister<A, L> {
    assumer: A,
    lister: L,
    format: OutputFormat,
}
pub struct BucketListerArgs<A, L> {
    pub assumer: A,
    pub lister: L,
    pub format: OutputFormat,
}
impl<A, L> BucketLister<A, L>
where
    A: RoleAssumer + Sync,
    L: ObjectLister + Sync,
{
    pub fn new(args: BucketListerArgs<A, L>) -> Self {
        Self {
            assumer: args.assumer,
            lister: args.lister,
            format: args.format,
        }
    }

    /// Assumes the target role, lists the bucket with the resulting
    /// credentials and writes every entry to `out`.
    ///
    /// The listing is fetched in full before anything is written, so a failed
    /// listing leaves `out` untouched. Returns the number of entries written.
    pub async fn run<W: Write>(&self, target: &ListTarget, out: &mut W) -> anyhow::Result<usize> {
        let creds = self
            .assumer
            .assume_role(&target.assume_role_request())
            .await
            .with_context(|| format!("could not assume role {}", target.role_arn))?;
        info!("assumed role {}", target.role_arn);
        debug!("session key {}", creds.access_key_id);

        let entries = self
            .lister
            .list(&creds, &target.bucket, target.prefix.as_deref())
            .await
            .with_context(|| format!("could not list bucket {}", target.bucket))?;
        info!("{} objects in {}", entries.len(), target.bucket);

        write_entries(out, &entries, self.format)?;
        Ok(entries.len())
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    };

    use anyhow::bail;
    use async_trait::async_trait;

    use super::{BucketLister, BucketListerArgs, ListTarget};
    use crate::{
        credentials::{AssumeRoleRequest, RoleAssumer, RoleCredentials},
        listing::{ObjectEntry, ObjectLister},
        output::OutputFormat,
    };

    fn fake_credentials() -> RoleCredentials {
        RoleCredentials {
            access_key_id: "ASIAFAKE".into(),
            secret_access_key: "secret".into(),
            session_token: "token".into(),
            expiration: None,
        }
    }

    #[derive(Default)]
    struct FakeAssumer {
        deny: bool,
        requests: Mutex<Vec<AssumeRoleRequest>>,
    }

    #[async_trait]
    impl RoleAssumer for FakeAssumer {
        async fn assume_role(&self, req: &AssumeRoleRequest) -> anyhow::Result<RoleCredentials> {
            self.requests.lock().unwrap().push(req.clone());
            if self.deny {
                bail!("AccessDenied: not authorized to perform sts:AssumeRole");
            }
            Ok(fake_credentials())
        }
    }

    #[derive(Default)]
    struct FakeLister {
        keys: Vec<&'static str>,
        fail: bool,
        calls: AtomicUsize,
    }

    impl FakeLister {
        fn with_keys(keys: Vec<&'static str>) -> Self {
            Self {
                keys,
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl ObjectLister for FakeLister {
        async fn list(
            &self,
            creds: &RoleCredentials,
            bucket: &str,
            _prefix: Option<&str>,
        ) -> anyhow::Result<Vec<ObjectEntry>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(creds, &fake_credentials());
            if self.fail {
                bail!("NoSuchBucket: {}", bucket);
            }
            Ok(self.keys.iter().map(|k| ObjectEntry::new(*k)).collect())
        }
    }

    fn lister(assumer: FakeAssumer, lister: FakeLister) -> BucketLister<FakeAssumer, FakeLister> {
        BucketLister::new(BucketListerArgs {
            assumer,
            lister,
            format: OutputFormat::Keys,
        })
    }

    #[test]
    fn default_target_is_release_bucket() {
        let target = ListTarget::default();
        assert_eq!(target.role_arn, "arn:aws:s3:::releases.yugabyte.com/ybc/");
        assert_eq!(target.session_name, "AssumeRoleSession");
        assert_eq!(target.bucket, "releases.yugabyte.com");
        assert_eq!(target.prefix, None);
        assert_eq!(target.duration_seconds, None);
    }

    #[tokio::test]
    async fn prints_keys_in_listing_order() -> anyhow::Result<()> {
        let bl = lister(
            FakeAssumer::default(),
            FakeLister::with_keys(vec!["a/file1.txt", "a/file2.txt", "b/file3.bin"]),
        );
        let mut out = Vec::<u8>::new();
        let n = bl.run(&ListTarget::default(), &mut out).await?;
        assert_eq!(n, 3);
        assert_eq!(
            String::from_utf8(out)?,
            "a/file1.txt\na/file2.txt\nb/file3.bin\n"
        );
        Ok(())
    }

    #[tokio::test]
    async fn empty_bucket_prints_nothing() -> anyhow::Result<()> {
        let bl = lister(FakeAssumer::default(), FakeLister::default());
        let mut out = Vec::<u8>::new();
        assert_eq!(bl.run(&ListTarget::default(), &mut out).await?, 0);
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn denied_role_skips_listing() -> anyhow::Result<()> {
        let bl = lister(
            FakeAssumer {
                deny: true,
                ..Default::default()
            },
            FakeLister::with_keys(vec!["a/file1.txt"]),
        );
        let mut out = Vec::<u8>::new();
        let err = bl.run(&ListTarget::default(), &mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("AccessDenied"));
        assert_eq!(bl.lister.calls.load(Ordering::SeqCst), 0);
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn failed_listing_prints_nothing() -> anyhow::Result<()> {
        let bl = lister(
            FakeAssumer::default(),
            FakeLister {
                keys: vec!["a/file1.txt", "a/file2.txt"],
                fail: true,
                ..Default::default()
            },
        );
        let mut out = Vec::<u8>::new();
        let err = bl.run(&ListTarget::default(), &mut out).await.unwrap_err();
        assert!(format!("{:#}", err).contains("could not list bucket releases.yugabyte.com"));
        assert_eq!(bl.lister.calls.load(Ordering::SeqCst), 1);
        assert!(out.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn repeated_runs_match() -> anyhow::Result<()> {
        let bl = lister(
            FakeAssumer::default(),
            FakeLister::with_keys(vec!["b/file3.bin", "a/file1.txt"]),
        );
        let mut first = Vec::<u8>::new();
        let mut second = Vec::<u8>::new();
        bl.run(&ListTarget::default(), &mut first).await?;
        bl.run(&ListTarget::default(), &mut second).await?;
        assert_eq!(first, second);
        assert_eq!(bl.lister.calls.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn target_is_forwarded_to_role_assumption() -> anyhow::Result<()> {
        let bl = lister(FakeAssumer::default(), FakeLister::default());
        let target = ListTarget {
            role_arn: "arn:aws:iam::123456789012:role/reader".into(),
            session_name: "nightly".into(),
            duration_seconds: Some(900),
            ..Default::default()
        };
        bl.run(&target, &mut Vec::<u8>::new()).await?;
        let requests = bl.assumer.requests.lock().unwrap();
        assert_eq!(
            *requests,
            vec![AssumeRoleRequest {
                role_arn: "arn:aws:iam::123456789012:role/reader".into(),
                session_name: "nightly".into(),
                duration_seconds: Some(900),
            }]
        );
        Ok(())
    }
}
