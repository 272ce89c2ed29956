//! Whole-instance scenarios across the presets.

use std::sync::Arc;

use heapfs_core::{
    AttributeValue, Configuration, CopyOptions, Feature, FileSystemRegistry, HeapFileSystem,
    LinkHandling, StoreError,
};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

#[test]
fn test_windows_names_are_case_insensitive() {
    init_tracing();
    let fs = HeapFileSystem::new(Configuration::windows()).unwrap();
    let dir = fs.parse_path("C:\\work\\Reports", &[]).unwrap();
    fs.create_directory(&dir, &[]).unwrap();
    let file = fs.parse_path("Reports\\Q1.TXT", &[]).unwrap();
    fs.create_file(&file, &[]).unwrap();

    let other_case = fs.parse_path("reports\\q1.txt", &[]).unwrap();
    assert!(fs.lookup(&other_case, LinkHandling::Follow).unwrap().exists());
    assert_eq!(other_case, file);
    assert!(matches!(
        fs.create_file(&other_case, &[]),
        Err(StoreError::AlreadyExists(_))
    ));

    let entries = fs.read_directory(&dir).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name.display(), "Q1.TXT");
}

#[test]
fn test_unix_names_are_case_sensitive() {
    let fs = HeapFileSystem::new(Configuration::unix()).unwrap();
    let lower = fs.parse_path("readme", &[]).unwrap();
    let upper = fs.parse_path("README", &[]).unwrap();
    fs.create_file(&lower, &[]).unwrap();
    fs.create_file(&upper, &[]).unwrap();
    assert_ne!(lower, upper);

    let work = fs.working_directory().clone();
    assert_eq!(fs.read_directory(&work).unwrap().len(), 2);
}

#[test]
fn test_os_x_unicode_forms_name_one_file() {
    let fs = HeapFileSystem::new(Configuration::os_x()).unwrap();
    let decomposed = fs.parse_path("cafe\u{301}", &[]).unwrap();
    fs.create_file(&decomposed, &[]).unwrap();

    let composed = fs.parse_path("caf\u{e9}", &[]).unwrap();
    assert!(fs.lookup(&composed, LinkHandling::Follow).unwrap().exists());
    // Decomposition runs before folding, so the base letter folds.
    let composed_upper = fs.parse_path("CAF\u{c9}", &[]).unwrap();
    assert!(fs.lookup(&composed_upper, LinkHandling::Follow).unwrap().exists());

    let other = fs.parse_path("caf\u{e8}", &[]).unwrap();
    assert!(!fs.lookup(&other, LinkHandling::Follow).unwrap().exists());

    let work = fs.working_directory().clone();
    let entries = fs.read_directory(&work).unwrap();
    assert_eq!(entries[0].name.display(), "caf\u{e9}");
}

#[test]
fn test_instance_from_ron() {
    init_tracing();
    let config = Configuration::from_ron(
        r#"(
            preset: Some(unix),
            block_size: Some(16),
            max_size: Some(64),
            roots: Some(["/", "/mnt"]),
            working_directory: Some("/home/user"),
            attribute_views: Some(["basic", "posix"]),
        )"#,
    );
    // `/mnt` is not a root under Unix syntax.
    assert!(config.is_err());

    let config = Configuration::from_ron(
        r#"(
            preset: Some(unix),
            block_size: Some(16),
            max_size: Some(64),
            working_directory: Some("/home/user"),
            attribute_views: Some(["basic", "posix"]),
        )"#,
    )
    .unwrap();
    let fs = HeapFileSystem::new(config).unwrap();
    assert_eq!(fs.working_directory().to_string(), "/home/user");
    assert_eq!(fs.disk_stats().total_blocks, 4);

    let home = fs.parse_path("/home", &[]).unwrap();
    assert_eq!(
        fs.get_attribute(&home, "isDirectory").unwrap(),
        AttributeValue::Bool(true)
    );
    assert!(fs.get_attribute(&home, "posix:permissions").is_ok());
}

#[test]
fn test_capacity_is_shared_by_all_files() {
    let config = Configuration::unix()
        .to_builder()
        .with_block_size(8)
        .unwrap()
        .with_max_size(32)
        .unwrap()
        .build()
        .unwrap();
    let fs = HeapFileSystem::new(config).unwrap();

    let a = fs.parse_path("a", &[]).unwrap();
    let b = fs.parse_path("b", &[]).unwrap();
    fs.create_file(&a, &[]).unwrap();
    fs.create_file(&b, &[]).unwrap();

    fs.open(&a).unwrap().write(0, &[1; 24]).unwrap();
    let handle = fs.open(&b).unwrap();
    assert!(matches!(
        handle.write(0, &[2; 16]),
        Err(StoreError::OutOfSpace { .. })
    ));
    assert_eq!(handle.size(), 0);
    handle.write(0, &[2; 8]).unwrap();

    fs.unlink(&a).unwrap();
    handle.write(8, &[2; 16]).unwrap();
    assert_eq!(handle.read_to_vec().unwrap(), vec![2; 24]);
}

#[test]
fn test_symbolic_link_chains() {
    let fs = HeapFileSystem::new(Configuration::unix()).unwrap();
    let target = fs.parse_path("/work/data", &[]).unwrap();
    fs.create_file(&target, &[]).unwrap();
    fs.open(&target).unwrap().write(0, b"payload").unwrap();

    let mut previous = target.clone();
    for i in 0..5 {
        let link = fs.parse_path(&format!("/work/link{i}"), &[]).unwrap();
        fs.create_symbolic_link(&link, &previous, &[]).unwrap();
        previous = link;
    }
    assert_eq!(fs.open(&previous).unwrap().read_to_vec().unwrap(), b"payload");

    let copied = fs.parse_path("/work/copy", &[]).unwrap();
    let options = CopyOptions {
        no_follow_links: true,
        ..CopyOptions::default()
    };
    let copy = fs.copy(&previous, &copied, options).unwrap();
    assert!(copy.is_symbolic_link());
    assert_eq!(fs.open(&copied).unwrap().read_to_vec().unwrap(), b"payload");
}

#[test]
fn test_rename_across_directories() {
    let fs = HeapFileSystem::new(Configuration::unix()).unwrap();
    let src_dir = fs.parse_path("/work/src", &[]).unwrap();
    let dst_dir = fs.parse_path("/work/dst", &[]).unwrap();
    fs.create_directory(&src_dir, &[]).unwrap();
    fs.create_directory(&dst_dir, &[]).unwrap();

    let from = src_dir.resolve_str("a.txt").unwrap();
    let to = dst_dir.resolve_str("b.txt").unwrap();
    let file = fs.create_file(&from, &[]).unwrap();

    fs.rename(&from, &to, false).unwrap();
    let moved = fs.lookup(&to, LinkHandling::NoFollow).unwrap();
    assert!(moved.file.as_ref().is_some_and(|f| Arc::ptr_eq(f, &file)));
    assert!(!fs.lookup(&from, LinkHandling::NoFollow).unwrap().exists());
    assert_eq!(file.links(), 1);

    assert!(matches!(
        fs.rename(&src_dir, &src_dir.resolve_str("inner").unwrap(), false),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn test_registry_resolves_uris() {
    let registry = FileSystemRegistry::new();
    let fs = registry
        .create_named("scratch", Configuration::unix())
        .unwrap();
    let dir = fs.parse_path("/work/docs", &[]).unwrap();
    fs.create_directory(&dir, &[]).unwrap();

    let uri = fs.to_uri(&dir).unwrap();
    assert_eq!(uri, "heapfs://scratch/work/docs/");
    let (found, path) = registry.resolve_uri(&uri).unwrap();
    assert!(Arc::ptr_eq(&found, &fs));
    assert_eq!(path, dir);

    drop(found);
    drop(fs);
    assert!(matches!(
        registry.resolve_uri(&uri),
        Err(StoreError::NotFound(_))
    ));
}

#[test]
fn test_features_follow_configuration() {
    let config = Configuration::windows()
        .to_builder()
        .with_supported_features([Feature::FileChannel])
        .build()
        .unwrap();
    let fs = HeapFileSystem::new(config).unwrap();
    assert!(!fs.supports(Feature::SymbolicLinks));

    let file = fs.parse_path("f", &[]).unwrap();
    let link = fs.parse_path("l", &[]).unwrap();
    fs.create_file(&file, &[]).unwrap();
    assert!(matches!(
        fs.create_symbolic_link(&link, &file, &[]),
        Err(StoreError::Unsupported(_))
    ));
    assert!(matches!(fs.link(&link, &file), Err(StoreError::Unsupported(_))));
}

#[test]
fn test_glob_matching_follows_preset() {
    let windows = HeapFileSystem::new(Configuration::windows()).unwrap();
    let matcher = windows.path_matcher("glob:*.TXT").unwrap();
    assert!(matcher.matches(&windows.parse_path("notes.txt", &[]).unwrap()));

    let unix = HeapFileSystem::new(Configuration::unix()).unwrap();
    let matcher = unix.path_matcher("glob:**/*.txt").unwrap();
    assert!(matcher.matches(&unix.parse_path("/work/a/notes.txt", &[]).unwrap()));
    assert!(!matcher.matches(&unix.parse_path("/work/a/notes.TXT", &[]).unwrap()));
}
