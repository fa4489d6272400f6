use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use pagemark_engine::editing::{Annotator, Cmd};
use pagemark_engine::{Page, parse_page, serialize_page};

fn generate_page(paragraphs: usize) -> String {
    let mut page = String::from("<body>");
    for index in 0..paragraphs {
        page.push_str(&format!(
            "\n  <p>Paragraph {index} with <b>some bold</b> text and a <a href=\"#{index}\">link</a>.</p>"
        ));
    }
    page.push_str("\n</body>");
    page
}

fn bench_parse_and_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_io");
    group.sample_size(20);

    for paragraphs in [10, 100, 1000] {
        let source = generate_page(paragraphs);
        group.bench_with_input(BenchmarkId::new("parse", paragraphs), &source, |b, source| {
            b.iter(|| std::hint::black_box(parse_page(source).unwrap()));
        });

        let tree = parse_page(&source).unwrap();
        group.bench_with_input(BenchmarkId::new("serialize", paragraphs), &tree, |b, tree| {
            b.iter(|| std::hint::black_box(serialize_page(tree)));
        });
    }

    group.finish();
}

fn bench_annotate(c: &mut Criterion) {
    let mut group = c.benchmark_group("annotate");
    group.sample_size(10);

    let source = generate_page(200);
    let page = Page::new(parse_page(&source).unwrap());

    group.bench_function("mark_across_paragraphs", |b| {
        b.iter(|| {
            let mut annotator = Annotator::new(page.clone());
            annotator.select_text("some bold text and a link.\n  Paragraph 1 with");
            let outcome = annotator
                .apply(Cmd::Mark { colour: "green".into() }, None)
                .unwrap();
            std::hint::black_box(outcome);
        });
    });

    group.bench_function("note_then_links", |b| {
        b.iter(|| {
            let mut annotator = Annotator::new(page.clone());
            for needle in ["Paragraph 10 ", "Paragraph 50 ", "Paragraph 150 "] {
                annotator.select_text(needle);
                annotator
                    .apply(
                        Cmd::CreateNote {
                            text: "benchmark note".to_string(),
                        },
                        None,
                    )
                    .unwrap();
            }
            std::hint::black_box(annotator.note_links().len());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_parse_and_serialize, bench_annotate);
criterion_main!(benches);
