use assert_fs::TempDir;
use camino::Utf8Path;
use chrono::{TimeZone, Utc};
use strongbox::{Config, Credential, Profile, ProfileTokenStore, StrongboxProblem, TokenStore};

fn temp_config() -> (TempDir, Config) {
    let tmp_home = TempDir::new().unwrap();
    let home = Utf8Path::from_path(tmp_home.path()).unwrap().to_owned();
    let config = Config::new(Some(&home)).unwrap();
    (tmp_home, config)
}

fn credential() -> Credential {
    Credential::new(
        Some("access-abc".to_string()),
        Some("refresh-xyz".to_string()),
        Some(Utc.timestamp_opt(1_800_000_000, 0).unwrap()),
    )
}

#[test]
fn it_persists_a_credential_across_opens() {
    let (_home, config) = temp_config();

    let store = ProfileTokenStore::open("default", &config).unwrap();
    assert!(!store.get().is_present());
    store.set(credential()).unwrap();
    assert!(store.path().exists());

    let reopened = ProfileTokenStore::open("default", &config).unwrap();
    assert_eq!(reopened.get(), credential());
}

#[test]
fn it_removes_the_file_on_clear() {
    let (_home, config) = temp_config();

    let store = ProfileTokenStore::open("default", &config).unwrap();
    store.set(credential()).unwrap();
    store.clear().unwrap();

    assert!(!store.path().exists());
    assert!(!ProfileTokenStore::open("default", &config).unwrap().get().is_present());
}

#[test]
fn it_loads_a_partial_file_as_absent() {
    let (_home, config) = temp_config();
    let dir = config.home.join("profiles").join("default");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(".credentials"), "access_token = \"only-half\"\n").unwrap();

    let store = ProfileTokenStore::open("default", &config).unwrap();
    assert!(!store.get().is_present());
}

#[test]
fn it_lists_and_deletes_profiles() {
    let (_home, config) = temp_config();

    ProfileTokenStore::open("site-office", &config).unwrap().set(credential()).unwrap();
    ProfileTokenStore::open("yard", &config).unwrap().set(credential()).unwrap();

    let profiles = Profile::list(&config).unwrap();
    assert_eq!(profiles, vec!["site-office".to_string(), "yard".to_string()]);

    Profile::delete("yard", &config).unwrap();
    assert_eq!(Profile::list(&config).unwrap(), vec!["site-office".to_string()]);
    assert!(Profile::delete("yard", &config).is_err());
}

#[test]
fn it_refuses_to_delete_outside_the_profiles_dir() {
    let (_home, config) = temp_config();
    let victim = config.home.join("victim");
    std::fs::create_dir_all(&victim).unwrap();
    ProfileTokenStore::open("yard", &config).unwrap().set(credential()).unwrap();

    for name in ["../victim", "..", ".", "", "yard/..", "..\\victim"] {
        let err = Profile::delete(name, &config).unwrap_err();
        assert!(
            matches!(err, StrongboxProblem::InvalidProfileName(ref n) if n == name),
            "{name:?} gave {err:?}"
        );
    }

    assert!(victim.exists());
    assert!(config.home.join("profiles").exists());
    assert_eq!(Profile::list(&config).unwrap(), vec!["yard".to_string()]);
}

#[test]
fn it_refuses_to_open_a_store_outside_the_profiles_dir() {
    let (_home, config) = temp_config();

    let err = ProfileTokenStore::open("../elsewhere", &config).unwrap_err();

    assert!(matches!(err, StrongboxProblem::InvalidProfileName(_)));
    assert!(!config.home.join("elsewhere").exists());
}
