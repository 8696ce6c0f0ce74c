use std::path::{Path, PathBuf};

use docrag_core::config::{expand_path, resolve_with_base, BackendKind, Settings};
use docrag_core::Error;
use figment::Jail;

#[test]
fn defaults_match_the_documented_surface() {
    let s = Settings::default();
    assert_eq!(s.embedding.model, "text-embedding-v4");
    assert_eq!(s.embedding.dimension, 1024);
    assert_eq!(s.embedding.backend, BackendKind::Dashscope);
    assert_eq!(s.chunking.chunk_size, 800);
    assert_eq!(s.chunking.chunk_overlap, 120);
    assert_eq!(s.retrieval.k, 3);
    assert_eq!(s.index.extensions, vec!["md".to_string()]);
    assert!(s.validate().is_ok());
}

#[test]
fn files_and_env_layer_over_defaults() {
    Jail::expect_with(|jail| {
        jail.create_file(
            "config.toml",
            r#"
            [chunking]
            chunk_size = 400
            chunk_overlap = 40

            [index]
            source_directory = "pages"
            "#,
        )?;
        jail.create_file("config.test.toml", "[retrieval]\nk = 5\n")?;
        jail.set_env("APP_EMBEDDING__DIMENSION", "768");

        let s: Settings = Settings::figment_for_env("test").extract()?;
        assert_eq!(s.chunking.chunk_size, 400);
        assert_eq!(s.chunking.chunk_overlap, 40);
        assert_eq!(s.index.source_directory, "pages");
        assert_eq!(s.index.persist_directory, "faiss_storage");
        assert_eq!(s.retrieval.k, 5);
        assert_eq!(s.embedding.dimension, 768);
        assert_eq!(s.embedding.model, "text-embedding-v4");
        Ok(())
    });
}

#[test]
fn fake_embeddings_flag_selects_the_hashing_backend() {
    Jail::expect_with(|jail| {
        jail.set_env("APP_USE_FAKE_EMBEDDINGS", "1");
        let s: Settings = Settings::figment_for_env("dev").extract()?;
        assert_eq!(s.embedding.backend, BackendKind::Hashing);
        Ok(())
    });
}

#[test]
fn load_rejects_invalid_options() {
    Jail::expect_with(|jail| {
        jail.create_file("config.toml", "[chunking]\nchunk_size = 100\nchunk_overlap = 100\n")?;
        let err = Settings::load_for_env("dev").expect_err("overlap >= size");
        assert!(err.to_string().contains("chunk_overlap"));
        Ok(())
    });
}

#[test]
fn validate_flags_each_bad_option() {
    let mut s = Settings::default();
    s.retrieval.k = 0;
    assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));

    let mut s = Settings::default();
    s.embedding.dimension = 0;
    assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));

    let mut s = Settings::default();
    s.index.extensions.clear();
    assert!(matches!(s.validate(), Err(Error::InvalidConfig(_))));
}

#[test]
fn path_helpers_expand_and_resolve() {
    Jail::expect_with(|jail| {
        jail.set_env("DOCRAG_TEST_ROOT", "/srv/data");
        assert_eq!(expand_path("${DOCRAG_TEST_ROOT}/md"), PathBuf::from("/srv/data/md"));
        Ok(())
    });
    let base = Path::new("/base");
    assert_eq!(resolve_with_base(base, "idx"), PathBuf::from("/base/idx"));
    assert_eq!(resolve_with_base(base, "/abs/idx"), PathBuf::from("/abs/idx"));
}

#[test]
fn index_paths_resolve_against_base_directory() {
    Jail::expect_with(|jail| {
        jail.set_env("DOCRAG_TEST_ROOT", "/srv/kb");
        jail.create_file(
            "config.toml",
            "[index]\nbase_directory = \"${DOCRAG_TEST_ROOT}\"\nsource_directory = \"notion_md\"\npersist_directory = \"/var/lib/docrag\"\n",
        )?;
        let settings = Settings::load_for_env("dev").expect("load");
        assert_eq!(settings.source_directory(), PathBuf::from("/srv/kb/notion_md"));
        assert_eq!(settings.persist_directory(), PathBuf::from("/var/lib/docrag"));
        Ok(())
    });

    let settings = Settings::default();
    assert_eq!(settings.index.base_directory, None);
    assert_eq!(settings.source_directory(), PathBuf::from("notion_md"));
}
