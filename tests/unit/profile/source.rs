use super::*;

struct Failing;

impl ProfileFetcher for Failing {
    fn fetch(&self, profile: BuiltinProfile) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("storage offline while fetching {profile}")
    }
}

#[test]
fn custom_profiles_win_over_builtins() {
    let mut src = ProfileSource::new(Failing);
    let bytes: Arc<[u8]> = BuiltinProfile::Newsprint.synthesize().into();
    src.insert_custom("offset-standard", bytes.clone());

    let p = src.resolve("offset-standard").unwrap();
    assert_eq!(p.origin, ProfileOrigin::Custom);
    assert!(Arc::ptr_eq(&p.bytes, &bytes));
    assert_eq!(p.to_engine_bytes(), bytes.to_vec());

    assert!(src.remove_custom("offset-standard"));
    assert!(!src.remove_custom("offset-standard"));
    assert!(src.resolve("offset-standard").is_err());
}

#[test]
fn fetch_failures_name_the_role() {
    let src = ProfileSource::new(Failing);
    let err = src.resolve_as(ProfileRole::Source, "srgb").unwrap_err();
    match err {
        ProofError::ProfileUnavailable {
            role,
            profile_id,
            reason,
        } => {
            assert_eq!(role, ProfileRole::Source);
            assert_eq!(profile_id, "srgb");
            assert!(reason.contains("storage offline"), "{reason}");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn unknown_and_empty_are_unavailable() {
    let src = ProfileSource::new(MemoryFetcher::new().with(BuiltinProfile::Srgb, Vec::new()));
    assert!(matches!(
        src.resolve("no-such-profile"),
        Err(ProofError::ProfileUnavailable { .. })
    ));
    let err = src.resolve_as(ProfileRole::Source, "srgb").unwrap_err();
    assert!(err.to_string().contains("no data"), "{err}");
    assert!(src.resolve("newsprint").is_err());
}

#[test]
fn synthetic_fetcher_is_stable() {
    let src = ProfileSource::synthetic();
    let a = src.resolve("offset-standard").unwrap();
    let b = src.clone().resolve("offset-standard").unwrap();
    assert_eq!(a.origin, ProfileOrigin::BuiltIn);
    assert_eq!(a.fingerprint(), b.fingerprint());
}

#[test]
fn directory_fetcher_reads_populated_catalog() {
    let dir = std::env::temp_dir().join(format!("softproof-catalog-{}", std::process::id()));
    let fetcher = DirectoryFetcher::new(&dir);
    let written = fetcher.populate().unwrap();
    assert_eq!(written.len(), BuiltinProfile::ALL.len());

    let src = ProfileSource::new(fetcher.clone());
    let p = src.resolve("newsprint").unwrap();
    assert_eq!(&*p.bytes, BuiltinProfile::Newsprint.synthesize().as_slice());

    std::fs::remove_file(dir.join("newsprint.icc")).unwrap();
    let err = src.resolve("newsprint").unwrap_err();
    assert!(err.to_string().contains("newsprint.icc"), "{err}");
    let _ = std::fs::remove_dir_all(&dir);
}
