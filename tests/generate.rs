use appimage_desktop::config::Config;
use appimage_desktop::generator::Generator;
use appimage_desktop::icons::Unpacker;
use appimage_desktop::{Error, Result};
use image::{ImageFormat, RgbaImage};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

fn png(size: u32) -> Vec<u8> {
    let img = RgbaImage::from_pixel(size, size, image::Rgba([10, 120, 200, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

/// Unpacks a canned tree per bundle file name; bundles without a tree fail.
#[derive(Default)]
struct TreeUnpacker {
    trees: HashMap<String, Vec<(&'static str, Vec<u8>)>>,
}

impl TreeUnpacker {
    fn with(mut self, bundle: &str, files: Vec<(&'static str, Vec<u8>)>) -> Self {
        self.trees.insert(bundle.to_string(), files);
        self
    }
}

impl Unpacker for TreeUnpacker {
    fn unpack(&self, bundle: &Path, dest: &Path) -> Result<PathBuf> {
        let name = bundle.file_name().unwrap().to_string_lossy().into_owned();
        let files = self.trees.get(&name).ok_or_else(|| Error::Extract {
            bundle: bundle.to_path_buf(),
            reason: "not a squashfs image".to_string(),
        })?;
        let root = dest.join("squashfs-root");
        fs::create_dir_all(&root).unwrap();
        for (relative, data) in files {
            let path = root.join(relative);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, data).unwrap();
        }
        Ok(root)
    }
}

struct Fixture {
    _dir: TempDir,
    config: Config,
}

impl Fixture {
    fn new(bundles: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.source_dir = dir.path().join("AppImages");
        config.paths.applications_dir = dir.path().join("applications");
        config.paths.icons_dir = dir.path().join("icons/hicolor");
        config.extract.work_dir = Some(dir.path().join("work"));
        config.entry.refresh_command = Vec::new();

        fs::create_dir_all(&config.paths.source_dir).unwrap();
        for bundle in bundles {
            fs::write(config.paths.source_dir.join(bundle), b"").unwrap();
        }
        Self { _dir: dir, config }
    }

    fn bundle_path(&self, name: &str) -> PathBuf {
        self.config.paths.source_dir.join(name)
    }

    fn desktop(&self, id: &str) -> String {
        fs::read_to_string(self.config.paths.applications_dir.join(format!("{id}.desktop"))).unwrap()
    }

    fn snapshot(&self) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files = Vec::new();
        for root in [&self.config.paths.applications_dir, &self.config.paths.icons_dir] {
            for entry in WalkDir::new(root).sort_by_file_name().into_iter().flatten() {
                if entry.file_type().is_file() {
                    files.push((entry.path().to_path_buf(), fs::read(entry.path()).unwrap()));
                }
            }
        }
        files
    }
}

#[test]
fn librewolf_scenario() {
    let fixture = Fixture::new(&["LibreWolf.x86_64.AppImage"]);
    let unpacker = TreeUnpacker::default().with(
        "LibreWolf.x86_64.AppImage",
        vec![
            ("librewolf.png", png(128)),
            ("usr/share/icons/hicolor/256x256/apps/librewolf.png", png(256)),
        ],
    );

    let report = Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();
    assert_eq!(report.bundles, 1);
    assert!(report.failed.is_empty());

    let content = fixture.desktop("LibreWolf-x86_64");
    let bundle = fixture.bundle_path("LibreWolf.x86_64.AppImage");
    assert!(content.starts_with("[Desktop Entry]\n"));
    assert!(content.contains("Name=LibreWolf\n"));
    assert!(content.contains("Categories=Network;WebBrowser;\n"));
    assert!(content.contains(&format!("Exec={} %u\n", bundle.display())));
    assert!(content.contains("Icon=LibreWolf-x86_64\n"));
    assert!(content.contains("Terminal=false\n"));

    let icon = fixture.config.paths.icons_dir.join("256x256/apps/LibreWolf-x86_64");
    assert_eq!(fs::read(icon).unwrap(), png(256));
}

#[test]
fn second_run_is_byte_identical() {
    let fixture = Fixture::new(&["Firefox.AppImage", "Notes-2.1.AppImage"]);
    let unpacker = || {
        TreeUnpacker::default()
            .with("Firefox.AppImage", vec![("firefox.png", png(64)), ("firefox-big.png", png(512))])
            .with("Notes-2.1.AppImage", vec![("notes.png", png(48))])
    };

    let first = Generator::with_unpacker(&fixture.config, Box::new(unpacker())).run_batch().unwrap();
    let before = fixture.snapshot();
    let second = Generator::with_unpacker(&fixture.config, Box::new(unpacker())).run_batch().unwrap();
    let after = fixture.snapshot();

    assert_eq!(first.changed, 2);
    assert_eq!(second.changed, 0);
    assert_eq!(before.len(), 4);
    assert_eq!(before, after);
}

#[test]
fn browsers_get_url_placeholder() {
    let names = ["Brave-Browser-x86_64.AppImage", "ungoogled-chromium_120.0.AppImage", "Obsidian-1.5.3.AppImage"];
    let fixture = Fixture::new(&names);
    let unpacker = names
        .iter()
        .fold(TreeUnpacker::default(), |u, name| u.with(name, Vec::new()));

    Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();

    let exec_line = |id: &str| {
        fixture
            .desktop(id)
            .lines()
            .find(|l| l.starts_with("Exec="))
            .unwrap()
            .to_string()
    };
    assert!(exec_line("Brave-Browser-x86_64").ends_with(" %u"));
    assert!(exec_line("ungoogled-chromium_120-0").ends_with(" %u"));
    assert!(!exec_line("Obsidian-1-5-3").ends_with(" %u"));
}

#[test]
fn bundle_without_images_still_gets_an_entry() {
    let fixture = Fixture::new(&["Plain.AppImage"]);
    let unpacker = TreeUnpacker::default().with("Plain.AppImage", vec![("AppRun", b"#!/bin/sh\n".to_vec())]);

    let report = Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();
    assert_eq!(report.without_icon, 1);

    let content = fixture.desktop("Plain");
    assert!(content.contains("Name=Plain\n"));
    assert!(!content.contains("Icon="));
    assert!(!fixture.config.paths.icons_dir.exists());
}

#[test]
fn icon_files_have_no_extension() {
    let fixture = Fixture::new(&["Tool.v2.AppImage", "Other.AppImage"]);
    let svg = br#"<svg xmlns="http://www.w3.org/2000/svg" width="32" height="32"><rect width="32" height="32"/></svg>"#;
    let unpacker = TreeUnpacker::default()
        .with("Tool.v2.AppImage", vec![("tool.png", png(96))])
        .with("Other.AppImage", vec![("usr/share/icons/hicolor/scalable/apps/other.svg", svg.to_vec())]);

    Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();

    let icons: Vec<PathBuf> = WalkDir::new(&fixture.config.paths.icons_dir)
        .into_iter()
        .flatten()
        .filter(|e| e.file_type().is_file())
        .map(|e| e.path().to_path_buf())
        .collect();
    assert_eq!(icons.len(), 2);
    for icon in &icons {
        assert_eq!(icon.extension(), None, "{icon:?}");
    }
    assert!(fixture.config.paths.icons_dir.join("scalable/apps/Other").is_file());
    assert!(fixture.config.paths.icons_dir.join("96x96/apps/Tool-v2").is_file());
}

#[test]
fn broken_bundle_does_not_stop_the_rest() {
    let fixture = Fixture::new(&["Broken.AppImage", "Good.AppImage"]);
    let unpacker = TreeUnpacker::default().with("Good.AppImage", vec![("good.png", png(32))]);

    let report = Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();
    assert_eq!(report.bundles, 2);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, fixture.bundle_path("Broken.AppImage"));
    assert!(fixture.desktop("Good").contains("Icon=Good\n"));
    assert!(!fixture.config.paths.applications_dir.join("Broken.desktop").exists());
}

#[test]
fn deleted_bundle_leaves_stale_entry() {
    let fixture = Fixture::new(&["Gone.AppImage"]);
    let unpacker = || TreeUnpacker::default().with("Gone.AppImage", vec![("gone.png", png(64))]);

    Generator::with_unpacker(&fixture.config, Box::new(unpacker())).run_batch().unwrap();
    fs::remove_file(fixture.bundle_path("Gone.AppImage")).unwrap();

    let report = Generator::with_unpacker(&fixture.config, Box::new(unpacker())).run_batch().unwrap();
    assert_eq!(report.bundles, 0);
    assert!(fixture.desktop("Gone").contains("Name=Gone\n"));
    assert!(fixture.config.paths.icons_dir.join("64x64/apps/Gone").is_file());
}

#[test]
fn relative_source_directory_gives_absolute_exec() {
    let mut fixture = Fixture::new(&[]);
    let sources = tempfile::Builder::new().prefix("bundles").tempdir_in(".").unwrap();
    fs::write(sources.path().join("Tool.AppImage"), b"").unwrap();
    fixture.config.paths.source_dir = PathBuf::from(sources.path().file_name().unwrap());

    let unpacker = TreeUnpacker::default().with("Tool.AppImage", Vec::new());
    Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();

    let content = fixture.desktop("Tool");
    let bundle = std::path::absolute(sources.path().join("Tool.AppImage")).unwrap();
    assert!(bundle.is_absolute());
    assert!(content.contains(&format!("Exec={}\n", bundle.display())), "{content}");
    assert!(content.contains(&format!("TryExec={}\n", bundle.display())), "{content}");
}

#[test]
fn missing_source_directory_halts() {
    let fixture = Fixture::new(&[]);
    fs::remove_dir(&fixture.config.paths.source_dir).unwrap();

    let result = Generator::with_unpacker(&fixture.config, Box::new(TreeUnpacker::default())).run_batch();
    assert!(matches!(result, Err(Error::MissingSourceDir(_))));
}

#[test]
fn extraction_directories_are_cleaned_up() {
    let fixture = Fixture::new(&["A.AppImage", "B.AppImage"]);
    let unpacker = TreeUnpacker::default().with("A.AppImage", vec![("a.png", png(16))]);

    Generator::with_unpacker(&fixture.config, Box::new(unpacker)).run_batch().unwrap();

    let work = fixture.config.extract.work_dir.as_ref().unwrap();
    assert_eq!(fs::read_dir(work).unwrap().count(), 0);
}
