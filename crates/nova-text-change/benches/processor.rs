use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use nova_text_change::{
    Document, EditGroup, EditId, EditProcessor, EditTree, NullProgressMonitor, ProcessorFlags,
    SharedDocument, TextChange, TextRange, TextSize,
};

const LINES: u32 = 2_000;

fn fixture() -> String {
    let mut out = String::new();
    for i in 0..LINES {
        out.push_str(&format!("    target(); // call {i:05}\n"));
    }
    out
}

/// Renames every `target` occurrence, one group per 16 lines.
fn rename_tree(text: &str) -> (EditTree, Vec<Vec<EditId>>) {
    let mut tree = EditTree::multi(TextRange::up_to(TextSize::of(text)));
    let root = tree.root();
    let mut groups = Vec::new();
    let mut current = Vec::new();
    for (i, (offset, _)) in text.match_indices("target").enumerate() {
        let start = TextSize::from(offset as u32);
        let range = TextRange::at(start, TextSize::of("target"));
        let id = tree
            .add_replace(root, range, "targetRenamed")
            .expect("fixture occurrences are disjoint");
        current.push(id);
        if i % 16 == 15 {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    (tree, groups)
}

fn bench_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_change");
    group.measurement_time(Duration::from_secs(2));
    group.warm_up_time(Duration::from_secs(1));
    group.sample_size(20);

    let text = fixture();

    group.bench_function("processor_undo", |b| {
        let (tree, _) = rename_tree(&text);
        b.iter_batched(
            || (Document::new(text.clone()), tree.clone()),
            |(mut document, mut tree)| {
                let undo = EditProcessor::new(
                    &mut document,
                    &mut tree,
                    ProcessorFlags::CREATE_UNDO | ProcessorFlags::UPDATE_REGIONS,
                )
                .perform()
                .expect("fixture applies");
                black_box((document, undo))
            },
            BatchSize::SmallInput,
        );
    });

    group.bench_function("scoped_preview", |b| {
        let document = SharedDocument::new(text.clone());
        let (tree, edit_groups) = rename_tree(&text);
        let mut change = TextChange::new("rename", Box::new(document));
        change.set_edit(tree);
        let ids: Vec<_> = edit_groups
            .into_iter()
            .enumerate()
            .map(|(i, edits)| change.add_edit_group(EditGroup::new(format!("lines {i}"), edits)))
            .collect();
        let scope = [ids[ids.len() / 2]];
        let region = change.group_region(scope[0]).expect("group has edits");

        b.iter(|| {
            black_box(
                change
                    .preview_content_for(black_box(&scope), region, true, 2)
                    .expect("preview succeeds"),
            )
        });
    });

    group.bench_function("perform_and_undo", |b| {
        b.iter_batched(
            || {
                let document = SharedDocument::new(text.clone());
                let (tree, _) = rename_tree(&text);
                let mut change = TextChange::new("rename", Box::new(document));
                change.set_edit(tree);
                change
            },
            |mut change| {
                let mut monitor = NullProgressMonitor::new();
                change.perform(&mut monitor).expect("perform succeeds");
                let mut undo = change.take_undo_change().expect("undo recorded");
                undo.perform(&mut monitor).expect("undo succeeds");
                black_box(undo)
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

criterion_group!(benches, bench_processor);
criterion_main!(benches);
