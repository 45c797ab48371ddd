/*!

This is the long-form manual for `union_roster` and `uroster`.

## Input formats

The following formats are supported, chosen from the file extension
(case does not matter):
* `csv` Comma Separated Values. The delimiter is detected from the header line
  among `,` `;` tab and `|`. Files that are not valid UTF-8 are read as Latin-1.
* `json` An array of objects, one object per candidate.
* `xlsx`, `xls` Excel workbooks. Only the first sheet is read and its first row
  holds the column names.

Whatever the format, the columns of the table are the union of the keys of all
the rows, in the order in which they first appear. Rows whose cells are all
empty are dropped.

### Dates

Columns whose name mentions a date or a seniority (`fecha`, `date`, `antig`...)
are normalized to `DD-MM-YYYY`. The following values are understood:
* date cells of a spreadsheet
* spreadsheet serial numbers (anything above 25569, which is 1970-01-01)
* `D/M/Y` or `D-M-Y` text, two digit years being read as `20YY`
* ISO-8601 and a few other common layouts

Values that cannot be read as a date after the year 1000 are kept as they are.
Other columns are never touched, even when their values look like dates.

## Identities

Each candidate gets an identity, built from the columns of the row:

1. the surname columns followed by the given name columns, each group sorted by
   column name
2. otherwise, all the columns that look like a name
3. otherwise, the national identifier (`DNI`, `NIF`, `NIE`...)
4. otherwise, the first column

Rows with the same identity are considered to be the same person. Two people
with exactly the same name are therefore merged, even when their national
identifiers differ.

The column patterns can be changed in the configuration file:

```json
{
  "unions": ["CCOO", "UGT", "SB", "SITCA", "OTRO"],
  "columnPatterns": {
    "surname": "apellido",
    "givenName": "nombre",
    "nationalId": "dni|nie"
  }
}
```

## Duplicates

A candidate is a duplicate when it is marked under two unions or more. The
report lists, for every union and in the order of the union list, the
duplicated candidates marked under it with the other unions they are marked
under. Unions without duplicates are left out.

## Search

Searches ignore case, accents and punctuation. Every word of the query must
appear somewhere in the row, in any order.

## Sessions

A session file keeps the imported table, the markings, the union list, the
submission and voting dates and the name of the imported file. Markings refer
to rows by their position in the imported file, starting at 0.

The dates of a session are written as `YYYY-MM-DD`. Full timestamps such as
`2024-05-16T22:00:00.000Z` are also read: they are converted to the local time
zone and only the calendar day is kept, so saving the session again writes the
plain date. Date cells of a spreadsheet are stored as `{"$date": "..."}` and
come back as dates.

*/
