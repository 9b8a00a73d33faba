//! Full scrape → download → assemble runs against a mock source site.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use image::{ImageFormat, Rgb, RgbImage};
use lopdf::Document;
use manga_scraper::error::ChapterError;
use manga_scraper::report::{Event, Reporter};
use manga_scraper::{Pipeline, Settings};
use tempfile::TempDir;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Clone, Default)]
struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl Recorder {
    fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl Reporter for Recorder {
    fn report(&self, event: Event<'_>) {
        let line = match event {
            Event::WorkDiscovered { work, chapters } => {
                format!("work {} ({})", work.title, chapters.len())
            }
            Event::ExtractionGap { gap, .. } => format!("gap {}", gap),
            Event::ChapterStarted { chapter, images } => {
                format!("start {} ({})", chapter.name, images)
            }
            Event::ChapterCompleted { chapter, report } => {
                format!("done {} ({})", chapter.name, report.document.page_count)
            }
            Event::ChapterFailed { chapter, .. } => format!("failed {}", chapter.name),
            Event::Finished { .. } => "finished".to_string(),
        };
        self.events.lock().unwrap().push(line);
    }
}

fn png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    RgbImage::from_pixel(width, height, Rgb([90, 90, 90]))
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

fn index_page(chapters: &[(&str, &str)]) -> String {
    let items: String = chapters
        .iter()
        .map(|(href, name)| {
            format!(
                r#"<li><a href="{}"><span class="chapternum">{}</span></a></li>"#,
                href, name
            )
        })
        .collect();
    format!(
        r#"<html><body>
        <h1 class="entry-title">Tower: of God</h1>
        <div class="fmed"><b>Author</b><span>SIU</span></div>
        <div class="fmed"><b>Artist</b><span>SIU</span></div>
        <div class="fmed"><b>Posted On</b><span>June 30, 2010</span></div>
        <div><b>Genres</b><span class="mgen"><a>Action</a><a>Fantasy</a></span></div>
        <div id="chapterlist"><ul>{}</ul></div>
        </body></html>"#,
        items
    )
}

fn chapter_page(images: &[&str]) -> String {
    let items: String = images
        .iter()
        .map(|src| format!(r#"<p><img src="{}"/></p>"#, src))
        .collect();
    format!(
        r#"<html><body><div id="readerarea">{}</div></body></html>"#,
        items
    )
}

async fn mount_html(server: &MockServer, page_path: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_png(server: &MockServer, image_path: &str, width: u32) {
    Mock::given(method("GET"))
        .and(path(image_path))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(png(width, 100)))
        .mount(server)
        .await;
}

fn settings(output: &TempDir) -> Settings {
    Settings {
        output_directory: output.path().to_string_lossy().into_owned(),
        max_retries: 0,
        request_timeout_secs: 5,
        ..Settings::default()
    }
}

fn page_count(pdf: &std::path::Path) -> usize {
    Document::load(pdf).unwrap().get_pages().len()
}

/// Two chapters listed newest first, three and two images.
async fn mock_site() -> MockServer {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/manga/tower-of-god/",
        index_page(&[("/tog-chapter-2/", "Chapter 2"), ("/tog-chapter-1/", "Chapter 1")]),
    )
    .await;
    mount_html(
        &server,
        "/tog-chapter-1/",
        chapter_page(&["/img/1/a.png", "/img/1/b.png", "/img/1/c.png"]),
    )
    .await;
    mount_html(
        &server,
        "/tog-chapter-2/",
        chapter_page(&["/img/2/a.png", "/img/2/b.png"]),
    )
    .await;
    for (p, w) in [
        ("/img/1/a.png", 60),
        ("/img/1/b.png", 70),
        ("/img/1/c.png", 80),
        ("/img/2/a.png", 60),
        ("/img/2/b.png", 70),
    ] {
        mount_png(&server, p, w).await;
    }
    server
}

fn work_url(server: &MockServer) -> Url {
    Url::parse(&format!("{}/manga/tower-of-god/", server.uri())).unwrap()
}

#[tokio::test]
async fn builds_one_pdf_per_chapter_oldest_first() {
    let server = mock_site().await;
    let output = TempDir::new().unwrap();
    let recorder = Recorder::default();
    let pipeline = Pipeline::new(settings(&output), recorder.clone()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    assert_eq!("Tower: of God", summary.work.title);
    assert_eq!(output.path().join("Tower of God"), summary.directory);
    assert_eq!(2, summary.completed().count());
    assert_eq!(0, summary.failed().count());

    let chapter_1 = summary.directory.join("Chapter 1").join("Chapter 1.pdf");
    let chapter_2 = summary.directory.join("Chapter 2").join("Chapter 2.pdf");
    assert_eq!(3, page_count(&chapter_1));
    assert_eq!(2, page_count(&chapter_2));
    assert!(summary.directory.join("Chapter 1").join("2.png").exists());

    assert_eq!(
        vec![
            "work Tower: of God (2)",
            "start Chapter 1 (3)",
            "done Chapter 1 (3)",
            "start Chapter 2 (2)",
            "done Chapter 2 (2)",
            "finished",
        ],
        recorder.events()
    );
}

#[tokio::test]
async fn newest_first_when_configured() {
    let server = mock_site().await;
    let output = TempDir::new().unwrap();
    let recorder = Recorder::default();
    let settings = Settings {
        oldest_first: false,
        ..settings(&output)
    };
    let pipeline = Pipeline::new(settings, recorder.clone()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    let order: Vec<_> = summary.chapters.iter().map(|c| c.chapter.name.as_str()).collect();
    assert_eq!(vec!["Chapter 2", "Chapter 1"], order);
}

#[tokio::test]
async fn failed_chapter_does_not_stop_the_run() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/manga/tower-of-god/",
        index_page(&[
            ("/tog-chapter-3/", "Chapter 3"),
            ("/tog-chapter-2/", "Chapter 2"),
            ("/tog-chapter-1/", "Chapter 1"),
        ]),
    )
    .await;
    // Chapter 2's page is missing entirely, chapter 3 lists no images
    mount_html(&server, "/tog-chapter-1/", chapter_page(&["/img/a.png"])).await;
    mount_html(&server, "/tog-chapter-3/", chapter_page(&[])).await;
    mount_png(&server, "/img/a.png", 50).await;
    let output = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(&output), Recorder::default()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    let completed: Vec<_> = summary.completed().map(|(c, _)| c.name.as_str()).collect();
    assert_eq!(vec!["Chapter 1"], completed);
    let failed: Vec<_> = summary.failed().collect();
    assert_eq!(2, failed.len());
    assert_eq!("Chapter 2", failed[0].0.name);
    assert!(matches!(failed[0].1, ChapterError::Document(_)));
    assert_eq!("Chapter 3", failed[1].0.name);
    assert!(matches!(failed[1].1, ChapterError::NoImages));
}

#[tokio::test]
async fn missing_page_still_assembles_the_rest() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/manga/tower-of-god/",
        index_page(&[("/tog-chapter-1/", "Chapter 1")]),
    )
    .await;
    mount_html(
        &server,
        "/tog-chapter-1/",
        chapter_page(&["/img/a.png", "/img/missing.png", "/img/c.png"]),
    )
    .await;
    mount_png(&server, "/img/a.png", 50).await;
    mount_png(&server, "/img/c.png", 50).await;
    let output = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(&output), Recorder::default()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    let (_, report) = summary.completed().next().unwrap();
    assert_eq!(3, report.images);
    assert_eq!(1, report.failures.len());
    assert_eq!(1, report.failures[0].index);
    assert_eq!(2, report.document.page_count);
    assert_eq!(2, page_count(&report.document.path));
}

#[tokio::test]
async fn index_failure_aborts_the_run() {
    let server = MockServer::start().await;
    let output = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(&output), Recorder::default()).unwrap();

    assert!(pipeline.run(&work_url(&server)).await.is_err());
}

#[tokio::test]
async fn clean_chapter_directories_removes_stale_pages() {
    let server = mock_site().await;
    let output = TempDir::new().unwrap();
    let stale = output
        .path()
        .join("Tower of God")
        .join("Chapter 2")
        .join("7.png");
    std::fs::create_dir_all(stale.parent().unwrap()).unwrap();
    std::fs::write(&stale, png(10, 10)).unwrap();
    let settings = Settings {
        clean_chapter_directories: true,
        ..settings(&output)
    };
    let pipeline = Pipeline::new(settings, Recorder::default()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    assert!(!stale.exists());
    let (_, report) = summary
        .completed()
        .find(|(c, _)| c.name == "Chapter 2")
        .unwrap();
    assert_eq!(2, report.document.page_count);
}

#[tokio::test]
async fn shorter_rerun_keeps_stale_files_out_of_the_document() {
    let server = mock_site().await;
    let output = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(&output), Recorder::default()).unwrap();
    pipeline.run(&work_url(&server)).await.unwrap();

    server.reset().await;
    mount_html(
        &server,
        "/manga/tower-of-god/",
        index_page(&[("/tog-chapter-1/", "Chapter 1")]),
    )
    .await;
    mount_html(
        &server,
        "/tog-chapter-1/",
        chapter_page(&["/img/1/a.png", "/img/1/b.png"]),
    )
    .await;
    mount_png(&server, "/img/1/a.png", 60).await;
    mount_png(&server, "/img/1/b.png", 70).await;
    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    let chapter_dir = output.path().join("Tower of God").join("Chapter 1");
    assert!(chapter_dir.join("2.png").exists());
    let (_, report) = summary.completed().next().unwrap();
    assert_eq!(2, report.document.page_count);
    assert_eq!(2, page_count(&chapter_dir.join("Chapter 1.pdf")));
}

#[tokio::test]
async fn leftover_file_with_another_extension_is_not_a_page() {
    let server = mock_site().await;
    let output = TempDir::new().unwrap();
    let chapter_dir = output.path().join("Tower of God").join("Chapter 2");
    std::fs::create_dir_all(&chapter_dir).unwrap();
    std::fs::write(chapter_dir.join("0.webp"), b"not an image").unwrap();
    let pipeline = Pipeline::new(settings(&output), Recorder::default()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    assert_eq!(0, summary.failed().count());
    assert_eq!(2, page_count(&chapter_dir.join("Chapter 2.pdf")));
}

#[tokio::test]
async fn chapters_with_the_same_name_get_separate_directories() {
    let server = MockServer::start().await;
    mount_html(
        &server,
        "/manga/tower-of-god/",
        index_page(&[("/tog-chapter-1-raw/", "Chapter 1"), ("/tog-chapter-1/", "Chapter 1")]),
    )
    .await;
    mount_html(&server, "/tog-chapter-1/", chapter_page(&["/img/a.png"])).await;
    mount_html(
        &server,
        "/tog-chapter-1-raw/",
        chapter_page(&["/img/x.png", "/img/y.png"]),
    )
    .await;
    for p in ["/img/a.png", "/img/x.png", "/img/y.png"] {
        mount_png(&server, p, 40).await;
    }
    let output = TempDir::new().unwrap();
    let pipeline = Pipeline::new(settings(&output), Recorder::default()).unwrap();

    let summary = pipeline.run(&work_url(&server)).await.unwrap();

    let work_dir = output.path().join("Tower of God");
    let first = work_dir.join("Chapter 1").join("Chapter 1.pdf");
    let second = work_dir.join("Chapter 1 (2)").join("Chapter 1 (2).pdf");
    assert_eq!(1, page_count(&first));
    assert_eq!(2, page_count(&second));
    let paths: Vec<_> = summary
        .completed()
        .map(|(_, r)| r.document.path.clone())
        .collect();
    assert_eq!(vec![first, second], paths);
}
