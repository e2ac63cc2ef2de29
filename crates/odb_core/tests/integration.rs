//! End-to-end tests: dictionary, encode, sort, merge, decode.

use odb_core::{
    cat, merge, open_all, paste, sort_and_merge, sort_in_place, CoreError, Dictionary,
    DictionaryBuilder, FieldValue, Input, KeyOrder, Projection, Range, RecordComparator,
    RecordDecoder, RecordEncoder, RecordWriter, SlotOrdering, Sorter,
};
use odb_format::{FormatError, Header, RecordLayout, Value};
use odb_storage::Access;
use proptest::prelude::*;
use std::fs::File;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn write_rows(path: &Path, header: &Header, rows: &[Vec<i64>]) {
    let mut writer = RecordWriter::create(File::create(path).unwrap(), header).unwrap();
    for row in rows {
        writer.write_slots(row).unwrap();
    }
    writer.flush().unwrap();
}

fn read_rows(path: &Path) -> Vec<Vec<i64>> {
    let mut input = Input::open(path, Access::Read).unwrap();
    let mut records = input.records();
    let mut rows = Vec::new();
    while let Some(row) = records.read_slots().unwrap() {
        rows.push(row);
    }
    rows
}

fn body_rows(bytes: &[u8]) -> (Header, Vec<Vec<i64>>) {
    let mut cursor = bytes;
    let header = Header::read(&mut cursor).unwrap();
    let layout = header.layout();
    let rows = cursor
        .chunks_exact(layout.record_size())
        .map(|r| {
            let mut slots = vec![0; layout.field_count()];
            layout.decode_into(r, &mut slots);
            slots
        })
        .collect();
    (header, rows)
}

fn int_file(dir: &TempDir, name: &str, schema: &str, rows: &[Vec<i64>]) -> PathBuf {
    let path = dir.path().join(name);
    write_rows(&path, &Header::parse_schema(schema).unwrap(), rows);
    path
}

#[test]
fn dictionary_lookups_are_stable() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("strings.idx");
    DictionaryBuilder::build_file(&path, ["apple", "banana", "cherry"]).unwrap();

    let dict = Dictionary::open(&path).unwrap();
    let i = dict.string_to_index(b"banana").unwrap();
    assert_eq!(dict.string_to_index(b"banana").unwrap(), i);
    assert_eq!(dict.index_to_string(i).unwrap(), b"banana");

    let reopened = Dictionary::open(&path).unwrap();
    assert_eq!(reopened.string_to_index(b"banana").unwrap(), i);
}

#[test]
fn sort_two_int_fields_ascending() {
    let layout = RecordLayout::new(2);
    let mut data = Vec::new();
    for row in [[3i64, 1], [1, 2], [2, 0]] {
        layout.encode_into(&row, &mut data);
    }
    let cmp = RecordComparator::raw(&KeyOrder::new(&[1], 2).unwrap());
    assert_eq!(sort_in_place(&mut data, layout, &cmp).unwrap(), 3);

    let (_, rows) = body_rows(&[Header::parse_schema("a:int,b:int").unwrap().to_bytes(), data].concat());
    assert_eq!(rows, vec![vec![1, 2], vec![2, 0], vec![3, 1]]);
}

#[test]
fn sort_two_int_fields_descending() {
    let dir = tempdir().unwrap();
    let path = int_file(&dir, "a.odb", "a:int,b:int", &[vec![3, 1], vec![1, 2], vec![2, 0]]);

    let mut input = Input::open(&path, Access::ReadWrite).unwrap();
    let order = KeyOrder::new(&[-1], 2).unwrap();
    let sorter = Sorter::new(&order, input.header(), SlotOrdering::RawBits);
    sorter.sort_file(&mut input).unwrap();
    drop(input);

    assert_eq!(read_rows(&path), vec![vec![3, 1], vec![2, 0], vec![1, 2]]);
}

#[test]
fn merge_two_sorted_files() {
    let dir = tempdir().unwrap();
    let a = int_file(&dir, "a.odb", "v:int", &[vec![1], vec![3], vec![5]]);
    let b = int_file(&dir, "b.odb", "v:int", &[vec![2], vec![4], vec![6]]);

    let (header, inputs) = open_all(&[&a, &b], Access::Read).unwrap();
    let sources = inputs.into_iter().map(Input::into_records).collect();
    let cmp = RecordComparator::raw(&KeyOrder::new(&[1], 1).unwrap());
    let mut out = Vec::new();
    assert_eq!(merge(sources, &header, cmp, &mut out).unwrap(), 6);

    let (_, rows) = body_rows(&out);
    assert_eq!(rows, (1..=6).map(|v| vec![v]).collect::<Vec<_>>());
}

#[test]
fn full_pipeline_with_strings() {
    let dir = tempdir().unwrap();
    let dict_path = dir.path().join("strings.idx");
    DictionaryBuilder::build_file(&dict_path, ["ant", "bee", "cat", "dog"]).unwrap();
    let dict = Dictionary::open(&dict_path).unwrap();
    let header = Header::parse_schema("name:string,weight:float,legs:int").unwrap();

    let encoder = RecordEncoder::new(&header, Some(&dict)).unwrap();
    let rows = [("dog", 30.5, 4), ("ant", 0.001, 6), ("cat", 4.0, 4), ("bee", 0.1, 6)];
    let path = dir.path().join("animals.odb");
    {
        let mut writer = RecordWriter::create(File::create(&path).unwrap(), &header).unwrap();
        for (name, weight, legs) in rows {
            let values = [
                encoder.string_value(name.as_bytes()).unwrap(),
                Value::Float(weight),
                Value::Integer(legs),
            ];
            writer.write_slots(&encoder.encode(&values).unwrap()).unwrap();
        }
        writer.flush().unwrap();
    }

    let mut out = Vec::new();
    sort_and_merge(&[&path], Some("legs,-weight"), SlotOrdering::Typed, Some(&mut out)).unwrap();

    let decoder = RecordDecoder::new(&header, Some(&dict)).unwrap();
    let body = &out[header.size()..];
    let names: Vec<&[u8]> = body
        .chunks_exact(header.layout().record_size())
        .map(|r| match decoder.decode(r).unwrap()[0] {
            FieldValue::Text(t) => t,
            ref other => panic!("unexpected value {other:?}"),
        })
        .collect();
    assert_eq!(names, vec![b"dog".as_slice(), b"cat", b"bee", b"ant"]);
}

#[test]
fn unknown_string_fails_encoding() {
    let dir = tempdir().unwrap();
    let dict_path = dir.path().join("strings.idx");
    DictionaryBuilder::build_file(&dict_path, ["apple", "banana", "cherry"]).unwrap();
    let dict = Dictionary::open(&dict_path).unwrap();
    let header = Header::parse_schema("fruit:string").unwrap();
    let encoder = RecordEncoder::new(&header, Some(&dict)).unwrap();

    let err = encoder.string_value(b"durian").unwrap_err();
    assert!(matches!(err, CoreError::UnknownString { .. }));
}

#[test]
fn incompatible_inputs_rejected_before_output() {
    let dir = tempdir().unwrap();
    let a = int_file(&dir, "a.odb", "v:int", &[vec![1]]);
    let b = int_file(&dir, "b.odb", "v:float", &[vec![1]]);

    let mut out = Vec::new();
    let err = sort_and_merge(&[&a, &b], None, SlotOrdering::RawBits, Some(&mut out)).unwrap_err();
    assert!(matches!(
        err,
        CoreError::Format(FormatError::SchemaMismatch { .. })
    ));
    assert!(out.is_empty());
}

#[test]
fn cat_with_projection_and_range() {
    let dir = tempdir().unwrap();
    let rows: Vec<Vec<i64>> = (1..=10).map(|i| vec![i, i * 100]).collect();
    let a = int_file(&dir, "a.odb", "id:int,score:int", &rows);
    let b = int_file(&dir, "b.odb", "id:int,score:int", &rows);

    let (header, inputs) = open_all(&[&a, &b], Access::Read).unwrap();
    let projection = Projection::parse("score=points,id", &header).unwrap();
    let range: Range = "-3:".parse().unwrap();
    let mut out = Vec::new();
    assert_eq!(cat(inputs, &projection, range, 2, &mut out).unwrap(), 4);

    let (out_header, rows) = body_rows(&out);
    assert_eq!(out_header, Header::parse_schema("points:int,id:int").unwrap());
    assert_eq!(
        rows,
        vec![vec![800, 8], vec![900, 9], vec![800, 8], vec![900, 9]]
    );
}

#[test]
fn cat_every_other_record_backwards() {
    let dir = tempdir().unwrap();
    let rows: Vec<Vec<i64>> = (1..=5).map(|i| vec![i]).collect();
    let a = int_file(&dir, "a.odb", "id:int", &rows);

    let (header, inputs) = open_all(&[&a], Access::Read).unwrap();
    let mut out = Vec::new();
    let range: Range = "-1:-2:1".parse().unwrap();
    cat(inputs, &Projection::identity(&header), range, u64::MAX, &mut out).unwrap();

    let (_, rows) = body_rows(&out);
    assert_eq!(rows, vec![vec![5], vec![3], vec![1]]);
}

#[test]
fn paste_then_sort() {
    let dir = tempdir().unwrap();
    let a = int_file(&dir, "a.odb", "x:int", &[vec![2], vec![1]]);
    let b = int_file(&dir, "b.odb", "y:int", &[vec![20], vec![10]]);
    let pasted = dir.path().join("pasted.odb");

    let inputs = vec![
        Input::open(&a, Access::Read).unwrap(),
        Input::open(&b, Access::Read).unwrap(),
    ];
    paste(inputs, File::create(&pasted).unwrap()).unwrap();
    sort_and_merge(&[&pasted], Some("y"), SlotOrdering::RawBits, None).unwrap();

    assert_eq!(read_rows(&pasted), vec![vec![1, 10], vec![2, 20]]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn sorted_file_is_ordered_permutation(
        rows in prop::collection::vec(prop::collection::vec(-20i64..20, 3), 0..100),
        positions in prop::sample::subsequence(vec![-1i64, 2, -3], 1..=3),
    ) {
        let dir = tempdir().unwrap();
        let path = int_file(&dir, "p.odb", "a:int,b:int,c:int", &rows);
        let order = KeyOrder::new(&positions, 3).unwrap();

        let mut input = Input::open(&path, Access::ReadWrite).unwrap();
        let sorter = Sorter::new(&order, input.header(), SlotOrdering::RawBits);
        prop_assert_eq!(sorter.sort_file(&mut input).unwrap(), rows.len() as u64);
        drop(input);

        let sorted = read_rows(&path);
        for pair in sorted.windows(2) {
            prop_assert_ne!(
                sorter.comparator().compare_slots(&pair[0], &pair[1]),
                std::cmp::Ordering::Greater
            );
        }
        let mut before = rows.clone();
        let mut after = sorted;
        before.sort();
        after.sort();
        prop_assert_eq!(before, after);
    }

    #[test]
    fn typed_ordering_sorts_floats_numerically(
        values in prop::collection::vec(-1.0e6f64..1.0e6, 0..60),
    ) {
        let dir = tempdir().unwrap();
        let header = Header::parse_schema("x:float").unwrap();
        let path = dir.path().join("f.odb");
        let rows: Vec<Vec<i64>> = values.iter().map(|v| vec![v.to_bits() as i64]).collect();
        write_rows(&path, &header, &rows);

        sort_and_merge(&[&path], None, SlotOrdering::Typed, None).unwrap();
        let sorted: Vec<f64> = read_rows(&path)
            .into_iter()
            .map(|r| f64::from_bits(r[0] as u64))
            .collect();
        let mut expected = values.clone();
        expected.sort_by(f64::total_cmp);
        prop_assert_eq!(sorted, expected);
    }
}

fn write_file_bytes(header: &Header, rows: &[Vec<i64>]) -> Vec<u8> {
    let mut writer = RecordWriter::create(Vec::new(), header).unwrap();
    for row in rows {
        writer.write_slots(row).unwrap();
    }
    writer.into_inner().unwrap()
}

#[test]
fn decode_then_encode_reproduces_bytes() {
    let dict = Dictionary::from_bytes({
        let mut bytes = Vec::new();
        DictionaryBuilder::build(["", "alpha", "omega"], &mut bytes).unwrap();
        bytes
    })
    .unwrap();
    let header = Header::parse_schema("i:int,f:float,s:string,t:timestamp,d:date").unwrap();
    let encoder = RecordEncoder::new(&header, Some(&dict)).unwrap();
    let decoder = RecordDecoder::new(&header, Some(&dict)).unwrap();

    let rows = [
        (i64::MIN, f64::MIN, "", -1.5e9, -86_400.0),
        (i64::MAX, f64::MAX, "omega", 4.1e12, 2.5e11),
        (0, -0.0, "alpha", 0.0, 0.0),
        (-1, f64::MIN_POSITIVE / 4.0, "alpha", f64::INFINITY, f64::NEG_INFINITY),
        (42, 0.123_456_789_012_345_67, "omega", 1_700_000_000.25, f64::NAN),
    ];
    let slots: Vec<Vec<i64>> = rows
        .iter()
        .map(|&(i, f, s, t, d)| {
            let values = [
                Value::Integer(i),
                Value::Float(f),
                encoder.string_value(s.as_bytes()).unwrap(),
                Value::Timestamp(t),
                Value::Date(d),
            ];
            encoder.encode(&values).unwrap()
        })
        .collect();
    let original = write_file_bytes(&header, &slots);

    let mut cursor = original.as_slice();
    let decoded_header = Header::read(&mut cursor).unwrap();
    assert_eq!(decoded_header, header);
    let reencoded: Vec<Vec<i64>> = cursor
        .chunks_exact(header.layout().record_size())
        .map(|record| {
            let values: Vec<Value> = decoder
                .decode(record)
                .unwrap()
                .into_iter()
                .map(|field| match field {
                    FieldValue::Integer(v) => Value::Integer(v),
                    FieldValue::Float(v) => Value::Float(v),
                    FieldValue::Text(t) => encoder.string_value(t).unwrap(),
                    FieldValue::Timestamp(v) => Value::Timestamp(v),
                    FieldValue::Date(v) => Value::Date(v),
                })
                .collect();
            encoder.encode(&values).unwrap()
        })
        .collect();

    assert_eq!(write_file_bytes(&decoded_header, &reencoded), original);
}
